use crate::parser::{AST, Fragment, ParserContext, WrapperType};

/// Malleability flags for one subtree.
///
/// `signed`: every satisfaction requires at least one signature.
/// `forced`: no dissatisfaction exists, or every one requires a signature.
/// `expressive`: a unique unconditional dissatisfaction exists and any
/// conditional ones require a signature.
/// `non_malleable`: a non-malleable satisfaction is guaranteed to exist.
#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone, Copy, PartialEq)]
pub struct Malleability {
    pub signed: bool,
    pub forced: bool,
    pub expressive: bool,
    pub non_malleable: bool,
}

impl Malleability {
    const fn new(signed: bool, forced: bool, expressive: bool, non_malleable: bool) -> Self {
        Self {
            signed,
            forced,
            expressive,
            non_malleable,
        }
    }
}

pub fn malleability<'a>(ctx: &ParserContext<'a>, node: &AST<'a>) -> Malleability {
    match &node.fragment {
        // 0 has no satisfaction at all, so "every satisfaction is signed"
        // holds vacuously; its empty dissatisfaction is unique.
        Fragment::False => Malleability::new(true, false, true, true),
        Fragment::True => Malleability::new(false, true, false, true),

        Fragment::PkK { .. }
        | Fragment::PkH { .. }
        | Fragment::Multi { .. }
        | Fragment::MultiA { .. } => Malleability::new(true, false, true, true),

        // Any wrong preimage dissatisfies, so the dissatisfaction is
        // neither unique nor signed.
        Fragment::Sha256 { .. }
        | Fragment::Hash256 { .. }
        | Fragment::Ripemd160 { .. }
        | Fragment::Hash160 { .. } => Malleability::new(false, false, false, true),

        Fragment::Older { .. } | Fragment::After { .. } => {
            Malleability::new(false, true, false, true)
        }

        Fragment::AndV { x, y } => {
            let x = malleability(ctx, ctx.get_node(*x));
            let y = malleability(ctx, ctx.get_node(*y));
            // s=sX+sY; f=sX+fY
            Malleability::new(
                x.signed || y.signed,
                x.signed || y.forced,
                false,
                x.non_malleable && y.non_malleable,
            )
        }
        Fragment::AndB { x, y } => {
            let x = malleability(ctx, ctx.get_node(*x));
            let y = malleability(ctx, ctx.get_node(*y));
            // s=sX+sY; f=fXfY+sXfX+sYfY; e=eXeYsXsY
            Malleability::new(
                x.signed || y.signed,
                (x.forced && y.forced) || (x.signed && x.forced) || (y.signed && y.forced),
                x.expressive && y.expressive && x.signed && y.signed,
                x.non_malleable && y.non_malleable,
            )
        }
        Fragment::AndOr { x, y, z } => {
            let x = malleability(ctx, ctx.get_node(*x));
            let y = malleability(ctx, ctx.get_node(*y));
            let z = malleability(ctx, ctx.get_node(*z));
            // s=sZ(sX+sY); f=fZ(sX+fY); e=eZ(sX+fY); m=eXmXmYmZ(sX+sY+sZ)
            Malleability::new(
                z.signed && (x.signed || y.signed),
                z.forced && (x.signed || y.forced),
                z.expressive && (x.signed || y.forced),
                x.expressive
                    && x.non_malleable
                    && y.non_malleable
                    && z.non_malleable
                    && (x.signed || y.signed || z.signed),
            )
        }
        Fragment::OrB { x, z } => {
            let x = malleability(ctx, ctx.get_node(*x));
            let z = malleability(ctx, ctx.get_node(*z));
            // s=sXsZ; e=eXeZ; m=eXeZmXmZ(sX+sZ)
            Malleability::new(
                x.signed && z.signed,
                false,
                x.expressive && z.expressive,
                x.expressive
                    && z.expressive
                    && x.non_malleable
                    && z.non_malleable
                    && (x.signed || z.signed),
            )
        }
        Fragment::OrC { x, z } => {
            let x = malleability(ctx, ctx.get_node(*x));
            let z = malleability(ctx, ctx.get_node(*z));
            // s=sXsZ; f; m=eXmXmZ(sX+sZ)
            Malleability::new(
                x.signed && z.signed,
                true,
                false,
                x.expressive && x.non_malleable && z.non_malleable && (x.signed || z.signed),
            )
        }
        Fragment::OrD { x, z } => {
            let x = malleability(ctx, ctx.get_node(*x));
            let z = malleability(ctx, ctx.get_node(*z));
            // s=sXsZ; f=fZ; e=eXeZ; m=eXmXmZ(sX+sZ)
            Malleability::new(
                x.signed && z.signed,
                z.forced,
                x.expressive && z.expressive,
                x.expressive && x.non_malleable && z.non_malleable && (x.signed || z.signed),
            )
        }
        Fragment::OrI { x, z } => {
            let x = malleability(ctx, ctx.get_node(*x));
            let z = malleability(ctx, ctx.get_node(*z));
            // s=sXsZ; f=fXfZ; e=eXfZ+fXeZ; m=mXmZ(sX+sZ)
            Malleability::new(
                x.signed && z.signed,
                x.forced && z.forced,
                (x.expressive && z.forced) || (x.forced && z.expressive),
                x.non_malleable && z.non_malleable && (x.signed || z.signed),
            )
        }
        Fragment::Thresh { k, xs } => {
            let mut all_e = true;
            let mut all_m = true;
            let mut num_s = 0usize;
            for x in xs {
                let sub = malleability(ctx, ctx.get_node(*x));
                all_e &= sub.expressive;
                all_m &= sub.non_malleable;
                if sub.signed {
                    num_s += 1;
                }
            }
            let n = xs.len();
            // more than n-k signed children force a signature onto every
            // satisfying assignment
            Malleability::new(
                num_s > n.saturating_sub(*k),
                false,
                all_e && num_s == n,
                all_e && all_m && num_s >= n.saturating_sub(*k),
            )
        }

        Fragment::Wrapped { wrapper, x } => {
            let sub = malleability(ctx, ctx.get_node(*x));
            match wrapper {
                WrapperType::A | WrapperType::S | WrapperType::N => sub,
                WrapperType::C => {
                    Malleability::new(true, sub.forced, sub.expressive, sub.non_malleable)
                }
                // The child is V: the only dissatisfaction is the
                // unconditional leading 0.
                WrapperType::D => Malleability::new(sub.signed, false, true, sub.non_malleable),
                WrapperType::V => Malleability::new(sub.signed, true, false, sub.non_malleable),
                // e: the nonzero dissatisfactions of the child must all
                // carry a signature
                WrapperType::J => Malleability::new(sub.signed, false, sub.forced, sub.non_malleable),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn flags(expr: &str) -> Malleability {
        let ctx = parse(expr).unwrap();
        malleability(&ctx, ctx.get_root())
    }

    #[test]
    fn keys_are_signed_and_expressive() {
        let m = flags("pk(a)");
        assert!(m.signed && m.expressive && m.non_malleable && !m.forced);
    }

    #[test]
    fn timelocks_are_forced() {
        let m = flags("older(10)");
        assert!(!m.signed && m.forced && !m.expressive && m.non_malleable);
    }

    #[test]
    fn hash_dissatisfaction_is_not_expressive() {
        let m = flags("sha256(h)");
        assert!(!m.signed && !m.forced && !m.expressive && m.non_malleable);
    }

    #[test]
    fn unsigned_disjunction_is_malleable() {
        // neither branch carries a signature
        let m = flags("or_b(l:after(100),al:after(200))");
        assert!(!m.signed);
        assert!(!m.non_malleable);
    }

    #[test]
    fn signed_disjunction_is_non_malleable() {
        let m = flags("or_b(pk(a),s:pk(b))");
        assert!(m.signed && m.non_malleable);
    }

    #[test]
    fn verify_forces_and_clears_expressive() {
        let m = flags("v:pk(a)");
        assert!(m.signed && m.forced && !m.expressive && m.non_malleable);
    }

    #[test]
    fn threshold_counts_signed_children() {
        // two of three children signed, k=2: enough for s and m
        let m = flags("thresh(2,pk(a),s:pk(b),sln:1)");
        assert!(m.signed && m.non_malleable && !m.expressive);

        // k=1 would need all three signed for s
        let m = flags("thresh(1,pk(a),s:pk(b),sln:1)");
        assert!(!m.signed);
        assert!(m.non_malleable);
    }
}
