use alloc::format;
use alloc::string::String;

use crate::parser::{AST, Fragment, ParserContext};

/// Canonical printer. Sugars are gone by parse time, so the output is the
/// expanded form (`pk(K)` prints as `c:pk_k(K)`).
pub struct Serializer {
    output: String,
}

impl Serializer {
    pub const fn new() -> Self {
        Self {
            output: String::new(),
        }
    }

    pub fn serialize(&mut self, ctx: &ParserContext<'_>) -> String {
        self.output.clear();
        self.serialize_node(ctx, ctx.get_root());
        self.output.clone()
    }

    fn serialize_node(&mut self, ctx: &ParserContext<'_>, ast: &AST<'_>) {
        match &ast.fragment {
            Fragment::False => self.output.push('0'),
            Fragment::True => self.output.push('1'),

            Fragment::PkK { key } => self.output.push_str(&format!("pk_k({})", key)),
            Fragment::PkH { key } => self.output.push_str(&format!("pk_h({})", key)),

            Fragment::Older { n } => self.output.push_str(&format!("older({})", n)),
            Fragment::After { n } => self.output.push_str(&format!("after({})", n)),

            Fragment::Sha256 { h } => self.output.push_str(&format!("sha256({})", h)),
            Fragment::Hash256 { h } => self.output.push_str(&format!("hash256({})", h)),
            Fragment::Ripemd160 { h } => self.output.push_str(&format!("ripemd160({})", h)),
            Fragment::Hash160 { h } => self.output.push_str(&format!("hash160({})", h)),

            Fragment::AndOr { x, y, z } => {
                self.output.push_str("andor(");
                self.serialize_node(ctx, ctx.get_node(*x));
                self.output.push(',');
                self.serialize_node(ctx, ctx.get_node(*y));
                self.output.push(',');
                self.serialize_node(ctx, ctx.get_node(*z));
                self.output.push(')');
            }
            Fragment::AndV { x, y } => self.binary(ctx, "and_v", *x, *y),
            Fragment::AndB { x, y } => self.binary(ctx, "and_b", *x, *y),
            Fragment::OrB { x, z } => self.binary(ctx, "or_b", *x, *z),
            Fragment::OrC { x, z } => self.binary(ctx, "or_c", *x, *z),
            Fragment::OrD { x, z } => self.binary(ctx, "or_d", *x, *z),
            Fragment::OrI { x, z } => self.binary(ctx, "or_i", *x, *z),

            Fragment::Thresh { k, xs } => {
                self.output.push_str(&format!("thresh({}", k));
                for x in xs {
                    self.output.push(',');
                    self.serialize_node(ctx, ctx.get_node(*x));
                }
                self.output.push(')');
            }
            Fragment::Multi { k, keys } => self.key_list("multi", *k, keys),
            Fragment::MultiA { k, keys } => self.key_list("multi_a", *k, keys),

            Fragment::Wrapped { wrapper, x } => {
                self.output.push(wrapper.letter());
                self.output.push(':');
                self.serialize_node(ctx, ctx.get_node(*x));
            }
        }
    }

    fn binary(
        &mut self,
        ctx: &ParserContext<'_>,
        name: &str,
        x: crate::parser::NodeIndex,
        y: crate::parser::NodeIndex,
    ) {
        self.output.push_str(name);
        self.output.push('(');
        self.serialize_node(ctx, ctx.get_node(x));
        self.output.push(',');
        self.serialize_node(ctx, ctx.get_node(y));
        self.output.push(')');
    }

    fn key_list(&mut self, name: &str, k: usize, keys: &[&str]) {
        self.output.push_str(&format!("{}({}", name, k));
        for key in keys {
            self.output.push(',');
            self.output.push_str(key);
        }
        self.output.push(')');
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse;

    #[test]
    fn sugars_print_expanded() {
        assert_eq!(parse("pk(a)").unwrap().serialize(), "c:pk_k(a)");
        assert_eq!(parse("t:pk(a)").unwrap().serialize(), "and_v(c:pk_k(a),1)");
        assert_eq!(
            parse("and_n(pk(a),pk(b))").unwrap().serialize(),
            "andor(c:pk_k(a),c:pk_k(b),0)"
        );
    }

    #[test]
    fn merged_wrapper_groups_split() {
        assert_eq!(parse("av:1").unwrap().serialize(), "a:v:1");
    }
}
