//! Module-level IR container with interned symbol table.
//!
//! `Module` is the top-level structure handed to a backend. It owns named
//! struct types, globals (placeholders or initialized), function
//! declarations, and symbol aliases, all addressed by small integer ids.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::constant::Constant;
use crate::types::{StructId, StructType, Type};

/// Interned symbol identifier. Indexes into a module-level symbol table.
///
/// Used for global names, struct type names, function names, and aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// Interned symbol table mapping names to `SymbolId`s.
///
/// Avoids repeated String allocation and enables O(1) equality comparison.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    names: Vec<String>,
    lookup: FxHashMap<String, SymbolId>,
}

impl SymbolTable {
    /// Create an empty symbol table.
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            lookup: FxHashMap::default(),
        }
    }

    /// Intern a symbol name, returning its `SymbolId`.
    ///
    /// If the name already exists, returns the existing id.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let id = SymbolId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), id);
        id
    }

    /// Look up a name without interning it.
    pub fn get(&self, name: &str) -> Option<SymbolId> {
        self.lookup.get(name).copied()
    }

    /// Resolve a `SymbolId` back to its name.
    pub fn resolve(&self, id: SymbolId) -> &str {
        &self.names[id.0 as usize]
    }

    /// Number of interned symbols.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a global in a `Module`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(pub(crate) u32);

impl GlobalId {
    /// Raw index into the global arena.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Handle to a function declaration in a `Module`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub(crate) u32);

impl FuncId {
    /// Raw index into the function arena.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// An addressable storage location in the data image.
#[derive(Debug, Clone)]
pub struct Global {
    pub name: SymbolId,
    pub ty: Type,
    /// `None` while the global is a placeholder.
    pub initializer: Option<Constant>,
    /// Read-only globals may be placed in a non-writable section.
    pub constant: bool,
    /// Set once this global has been merged into another one and removed.
    merged_into: Option<GlobalId>,
}

impl Global {
    pub fn is_uninitialized(&self) -> bool {
        self.initializer.is_none()
    }

    pub fn is_removed(&self) -> bool {
        self.merged_into.is_some()
    }
}

/// A callable declaration. Bodies are produced outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub name: SymbolId,
    pub params: Vec<Type>,
    pub ret: Option<Type>,
}

/// An extra symbol name bound to a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alias {
    pub name: SymbolId,
    pub target: FuncId,
}

/// Top-level IR container.
pub struct Module {
    pub name: String,
    /// Pointer width in bits.
    pub native_int_size: u32,
    pub symbols: SymbolTable,
    structs: Vec<StructType>,
    struct_lookup: FxHashMap<SymbolId, StructId>,
    globals: Vec<Global>,
    global_names: FxHashMap<SymbolId, GlobalId>,
    functions: Vec<FuncDecl>,
    function_lookup: FxHashMap<SymbolId, FuncId>,
    aliases: Vec<Alias>,
}

impl Module {
    /// Create a new empty module.
    pub fn new(name: impl Into<String>, native_int_size: u32) -> Self {
        Self {
            name: name.into(),
            native_int_size,
            symbols: SymbolTable::new(),
            structs: Vec::new(),
            struct_lookup: FxHashMap::default(),
            globals: Vec::new(),
            global_names: FxHashMap::default(),
            functions: Vec::new(),
            function_lookup: FxHashMap::default(),
            aliases: Vec::new(),
        }
    }

    /// Intern a symbol name in this module's symbol table.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        self.symbols.intern(name)
    }

    /// Resolve a symbol id to its name.
    pub fn resolve(&self, id: SymbolId) -> &str {
        self.symbols.resolve(id)
    }

    // -----------------------------------------------------------------------
    // Struct types
    // -----------------------------------------------------------------------

    /// Register a named struct type. A name that is already registered keeps
    /// its first body.
    pub fn declare_struct(&mut self, name: &str, fields: Vec<Type>) -> StructId {
        let sym = self.intern(name);
        if let Some(&id) = self.struct_lookup.get(&sym) {
            return id;
        }
        let id = StructId(self.structs.len() as u32);
        self.structs.push(StructType { name: sym, fields });
        self.struct_lookup.insert(sym, id);
        id
    }

    pub fn struct_type(&self, id: StructId) -> &StructType {
        &self.structs[id.0 as usize]
    }

    pub fn struct_count(&self) -> usize {
        self.structs.len()
    }

    pub fn find_struct(&self, name: &str) -> Option<StructId> {
        let sym = self.symbols.get(name)?;
        self.struct_lookup.get(&sym).copied()
    }

    pub fn struct_types(&self) -> impl Iterator<Item = (StructId, &StructType)> {
        self.structs
            .iter()
            .enumerate()
            .map(|(i, st)| (StructId(i as u32), st))
    }

    // -----------------------------------------------------------------------
    // Globals
    // -----------------------------------------------------------------------

    /// Pick a symbol for a new global, suffixing `.N` while the name is taken.
    fn unique_global_name(&mut self, base: &str) -> SymbolId {
        let mut sym = self.intern(base);
        let mut n = 1;
        while self.global_names.contains_key(&sym) {
            sym = self.intern(&format!("{base}.{n}"));
            n += 1;
        }
        sym
    }

    fn push_global(&mut self, base: &str, ty: Type, initializer: Option<Constant>) -> GlobalId {
        let name = self.unique_global_name(base);
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(Global {
            name,
            ty,
            initializer,
            constant: false,
            merged_into: None,
        });
        self.global_names.insert(name, id);
        id
    }

    /// Declare a global of `ty` with no content yet.
    pub fn add_uninitialized_global(&mut self, name: &str, ty: Type) -> GlobalId {
        self.push_global(name, ty, None)
    }

    /// Create an initialized global whose type is the constant's type.
    pub fn add_global_from_constant(&mut self, name: &str, init: Constant) -> GlobalId {
        let ty = init.ty();
        self.push_global(name, ty, Some(init))
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.0 as usize]
    }

    /// Follow merge links to the live global standing for `id`.
    pub fn resolve_global(&self, mut id: GlobalId) -> GlobalId {
        while let Some(next) = self.globals[id.0 as usize].merged_into {
            id = next;
        }
        id
    }

    pub fn find_global(&self, name: &str) -> Option<GlobalId> {
        let sym = self.symbols.get(name)?;
        self.global_names.get(&sym).copied()
    }

    pub fn is_uninitialized(&self, id: GlobalId) -> bool {
        self.global(id).is_uninitialized()
    }

    /// Set the content of a global.
    pub fn set_initializer(&mut self, id: GlobalId, init: Constant) {
        self.globals[id.0 as usize].initializer = Some(init);
    }

    /// Mark a global read-only.
    pub fn flag_as_constant(&mut self, id: GlobalId) {
        self.globals[id.0 as usize].constant = true;
    }

    /// Merge `from` into `into` and remove `from`.
    ///
    /// Every reference to `from` is redirected to `into`. A placeholder
    /// `into` adopts the type and content of `from`.
    pub fn merge_global(&mut self, from: GlobalId, into: GlobalId) {
        if from == into {
            return;
        }
        let taken = self.globals[from.0 as usize].initializer.take();
        let from_ty = self.globals[from.0 as usize].ty.clone();
        let from_name = self.globals[from.0 as usize].name;
        self.globals[from.0 as usize].merged_into = Some(into);
        self.global_names.remove(&from_name);

        let target = &mut self.globals[into.0 as usize];
        if target.initializer.is_none()
            && let Some(init) = taken
        {
            target.ty = from_ty;
            target.initializer = Some(init);
        }

        for g in &mut self.globals {
            if let Some(init) = g.initializer.as_mut() {
                init.replace_global(from, into);
            }
        }
    }

    /// Iterate live (not merged-away) globals in creation order.
    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &Global)> {
        self.globals
            .iter()
            .enumerate()
            .filter(|(_, g)| !g.is_removed())
            .map(|(i, g)| (GlobalId(i as u32), g))
    }

    /// Number of global slots ever allocated, merged-away ones included.
    pub fn global_slots(&self) -> usize {
        self.globals.len()
    }

    /// Number of live globals.
    pub fn global_count(&self) -> usize {
        self.globals().count()
    }

    // -----------------------------------------------------------------------
    // Functions and aliases
    // -----------------------------------------------------------------------

    /// Return the declaration named `name`, adding it if missing.
    pub fn get_or_insert_function(
        &mut self,
        name: &str,
        params: Vec<Type>,
        ret: Option<Type>,
    ) -> FuncId {
        let sym = self.intern(name);
        if let Some(&id) = self.function_lookup.get(&sym) {
            return id;
        }
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(FuncDecl {
            name: sym,
            params,
            ret,
        });
        self.function_lookup.insert(sym, id);
        id
    }

    pub fn function(&self, id: FuncId) -> &FuncDecl {
        &self.functions[id.0 as usize]
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &FuncDecl)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId(i as u32), f))
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Bind `name` as an additional symbol for `target`.
    pub fn create_alias(&mut self, name: &str, target: FuncId) {
        let sym = self.intern(name);
        self.aliases.retain(|a| a.name != sym);
        self.aliases.push(Alias { name: sym, target });
    }

    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("native_int_size", &self.native_int_size)
            .field("symbols", &format!("[{} symbols]", self.symbols.len()))
            .field("structs", &format!("[{} types]", self.structs.len()))
            .field("globals", &format!("[{} globals]", self.global_count()))
            .field(
                "functions",
                &format!("[{} functions]", self.functions.len()),
            )
            .field("aliases", &self.aliases.len())
            .finish()
    }
}
