//! LLVM-flavoured text format for modules.
//!
//! Output format:
//! ```text
//! ; module image (native int 32)
//!
//! %System.Int32 = type { i32 }
//!
//! @Foo_3 = constant %Foo { %System.Object { ... }, %System.Int32 { i32 7 } }
//! @Bar_4 = global %Bar uninitialized
//!
//! declare @Foo::Run_2(ptr) -> i32
//!
//! alias @main = @Bootstrap_Initialization
//! ```
//!
//! Everything is printed in creation order so identical inputs produce
//! identical text.

use std::fmt;

use crate::constant::{Constant, sign_extend};
use crate::module::Module;
use crate::types::Type;

/// Format a type, resolving named structs through the module.
pub fn fmt_type(module: &Module, ty: &Type) -> String {
    match ty {
        Type::Int(bits) => format!("i{bits}"),
        Type::Ptr => "ptr".to_string(),
        Type::Struct(id) => format!("%{}", module.resolve(module.struct_type(*id).name)),
        Type::Anon(fields) => {
            if fields.is_empty() {
                "{}".to_string()
            } else {
                let parts: Vec<String> = fields.iter().map(|f| fmt_type(module, f)).collect();
                format!("{{ {} }}", parts.join(", "))
            }
        }
        Type::Array(elem, n) => format!("[{n} x {}]", fmt_type(module, elem)),
    }
}

/// Format a constant with its type prefix.
pub fn fmt_const(module: &Module, c: &Constant) -> String {
    match c {
        Constant::Int {
            bits,
            value,
            signed,
        } => {
            if *signed {
                format!("i{bits} {}", sign_extend(*value, *bits))
            } else {
                format!("i{bits} {value}")
            }
        }
        Constant::Zeroed(ty) => format!("{} zeroinitializer", fmt_type(module, ty)),
        Constant::Struct { fields, .. } => {
            let ty = fmt_type(module, &c.ty());
            if fields.is_empty() {
                format!("{ty} {{}}")
            } else {
                let parts: Vec<String> = fields.iter().map(|f| fmt_const(module, f)).collect();
                format!("{ty} {{ {} }}", parts.join(", "))
            }
        }
        Constant::Array { elems, .. } => {
            let ty = fmt_type(module, &c.ty());
            let parts: Vec<String> = elems.iter().map(|e| fmt_const(module, e)).collect();
            format!("{ty} [{}]", parts.join(", "))
        }
        Constant::GlobalAddr(g) => {
            let live = module.resolve_global(*g);
            format!("ptr @{}", module.resolve(module.global(live).name))
        }
        Constant::FuncAddr(f) => format!("ptr @{}", module.resolve(module.function(*f).name)),
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "; module {} (native int {})",
            self.name, self.native_int_size
        )?;

        let mut structs = self.struct_types().peekable();
        if structs.peek().is_some() {
            writeln!(f)?;
        }
        for (_, st) in structs {
            let fields: Vec<String> = st.fields.iter().map(|t| fmt_type(self, t)).collect();
            writeln!(
                f,
                "%{} = type {{ {} }}",
                self.resolve(st.name),
                fields.join(", ")
            )?;
        }

        let mut globals = self.globals().peekable();
        if globals.peek().is_some() {
            writeln!(f)?;
        }
        for (_, g) in globals {
            let kind = if g.constant { "constant" } else { "global" };
            let name = self.resolve(g.name);
            match &g.initializer {
                Some(init) => writeln!(f, "@{name} = {kind} {}", fmt_const(self, init))?,
                None => writeln!(
                    f,
                    "@{name} = {kind} {} uninitialized",
                    fmt_type(self, &g.ty)
                )?,
            }
        }

        let mut functions = self.functions().peekable();
        if functions.peek().is_some() {
            writeln!(f)?;
        }
        for (_, func) in functions {
            let params: Vec<String> = func.params.iter().map(|t| fmt_type(self, t)).collect();
            write!(f, "declare @{}({})", self.resolve(func.name), params.join(", "))?;
            if let Some(ret) = &func.ret {
                write!(f, " -> {}", fmt_type(self, ret))?;
            }
            writeln!(f)?;
        }

        if !self.aliases().is_empty() {
            writeln!(f)?;
        }
        for alias in self.aliases() {
            writeln!(
                f,
                "alias @{} = @{}",
                self.resolve(alias.name),
                self.resolve(self.function(alias.target).name)
            )?;
        }
        Ok(())
    }
}
