//! Built-in types and operators, installed into the file-level context
//! before checking starts.

use bolt_parser::scope::SymbolKind;

use crate::infer::Checker;
use crate::ty::{Binders, Quant, Scheme, Ty};

impl Checker<'_> {
    pub(crate) fn install_builtins(&mut self) {
        let int = self.builtins.int.clone();
        let bool_ty = self.builtins.bool.clone();
        let string = self.builtins.string.clone();
        let list = self.builtins.list.clone();

        self.add_binding("Int", Scheme::mono(int.clone()), SymbolKind::Type);
        self.add_binding("Bool", Scheme::mono(bool_ty.clone()), SymbolKind::Type);
        self.add_binding("String", Scheme::mono(string), SymbolKind::Type);
        self.add_binding("List", Scheme::mono(list), SymbolKind::Type);

        self.add_binding(
            "True",
            Scheme::mono(bool_ty.clone()),
            SymbolKind::Constructor,
        );
        self.add_binding(
            "False",
            Scheme::mono(bool_ty.clone()),
            SymbolKind::Constructor,
        );

        // Equality is polymorphic; the variable is allocated directly on
        // the table so it does not join the file context's local set.
        let eq_var = self.table.new_key(None);
        let eq_ty = Ty::build_arrow(
            vec![Ty::Var(eq_var), Ty::Var(eq_var)],
            bool_ty.clone(),
        );
        self.add_binding(
            "==",
            Scheme {
                binders: Binders::Explicit(vec![Quant::Var(eq_var)]),
                ty: eq_ty,
            },
            SymbolKind::Var,
        );

        let arith = Ty::build_arrow(vec![int.clone(), int.clone()], int.clone());
        for op in ["+", "-", "*", "/", "%"] {
            self.add_binding(op, Scheme::mono(arith.clone()), SymbolKind::Var);
        }

        let compare = Ty::build_arrow(vec![int.clone(), int], bool_ty);
        for op in ["<", ">"] {
            self.add_binding(op, Scheme::mono(compare.clone()), SymbolKind::Var);
        }
    }
}
