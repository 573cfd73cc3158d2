use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use crate::locks::{self, RelativeUnits};
use crate::malleability::{Malleability, malleability};
use crate::parser::{AST, ASTVisitor, Fragment, ParserContext};
use crate::type_checker::{CorrectnessVisitor, MiniscriptType, TypeError, TypeInfo};

/// Analysis options.
#[derive(Clone, Copy, Default)]
pub struct AnalyzerContext {
    pub tapscript: bool,
}

// Timelocks

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone, Copy, Default, PartialEq)]
pub struct TimelockInfo {
    pub csv_with_height: bool,
    pub csv_with_time: bool,
    pub cltv_with_height: bool,
    pub cltv_with_time: bool,
    /// Latches when a conjunction joins height- and time-based locks of the
    /// same kind, which no transaction can satisfy.
    pub contains_combination: bool,
}

impl TimelockInfo {
    // Branches of a disjunction are satisfied separately, so flags just
    // accumulate.
    fn combine_or(self, other: Self) -> Self {
        Self {
            csv_with_height: self.csv_with_height || other.csv_with_height,
            csv_with_time: self.csv_with_time || other.csv_with_time,
            cltv_with_height: self.cltv_with_height || other.cltv_with_height,
            cltv_with_time: self.cltv_with_time || other.cltv_with_time,
            contains_combination: self.contains_combination || other.contains_combination,
        }
    }

    // Both sides must be satisfied together: mixed units across the two
    // children are unspendable.
    fn combine_and(self, other: Self) -> Self {
        let mixed = (self.csv_with_height && other.csv_with_time)
            || (self.csv_with_time && other.csv_with_height)
            || (self.cltv_with_height && other.cltv_with_time)
            || (self.cltv_with_time && other.cltv_with_height);
        let mut combined = self.combine_or(other);
        combined.contains_combination |= mixed;
        combined
    }
}

fn timelock_info<'a>(ctx: &ParserContext<'a>, node: &AST<'a>) -> TimelockInfo {
    match &node.fragment {
        Fragment::Older { n } => {
            let mut info = TimelockInfo::default();
            if matches!(locks::relative_units(*n), Ok(RelativeUnits::Seconds)) {
                info.csv_with_time = true;
            } else {
                info.csv_with_height = true;
            }
            info
        }
        Fragment::After { n } => {
            let mut info = TimelockInfo::default();
            if locks::is_height_lock(*n) {
                info.cltv_with_height = true;
            } else {
                info.cltv_with_time = true;
            }
            info
        }

        Fragment::AndV { x, y } | Fragment::AndB { x, y } => {
            let x = timelock_info(ctx, ctx.get_node(*x));
            let y = timelock_info(ctx, ctx.get_node(*y));
            x.combine_and(y)
        }
        // X and Y are spent together; Z is the alternative path.
        Fragment::AndOr { x, y, z } => {
            let x = timelock_info(ctx, ctx.get_node(*x));
            let y = timelock_info(ctx, ctx.get_node(*y));
            let z = timelock_info(ctx, ctx.get_node(*z));
            x.combine_and(y).combine_or(z)
        }

        Fragment::OrB { x, z }
        | Fragment::OrC { x, z }
        | Fragment::OrD { x, z }
        | Fragment::OrI { x, z } => {
            let x = timelock_info(ctx, ctx.get_node(*x));
            let z = timelock_info(ctx, ctx.get_node(*z));
            x.combine_or(z)
        }

        Fragment::Thresh { k, xs } => {
            let mut acc = TimelockInfo::default();
            for x in xs {
                let sub = timelock_info(ctx, ctx.get_node(*x));
                acc = if *k > 1 {
                    acc.combine_and(sub)
                } else {
                    acc.combine_or(sub)
                };
            }
            acc
        }

        Fragment::Wrapped { x, .. } => timelock_info(ctx, ctx.get_node(*x)),

        _ => TimelockInfo::default(),
    }
}

// Keys

struct KeyInfo<'a> {
    keys: BTreeSet<&'a str>,
    has_duplicate_keys: bool,
}

impl<'a> KeyInfo<'a> {
    fn empty() -> Self {
        Self {
            keys: BTreeSet::new(),
            has_duplicate_keys: false,
        }
    }

    fn from_keys(keys: &[&'a str]) -> Self {
        let mut info = Self::empty();
        for key in keys {
            if !info.keys.insert(*key) {
                info.has_duplicate_keys = true;
            }
        }
        info
    }

    // Sibling subtrees sharing any key make the whole expression repeat
    // pubkeys.
    fn merge(mut self, other: Self) -> Self {
        self.has_duplicate_keys |= other.has_duplicate_keys;
        self.has_duplicate_keys |= !self.keys.is_disjoint(&other.keys);
        self.keys.extend(other.keys);
        self
    }
}

fn key_info<'a>(ctx: &ParserContext<'a>, node: &AST<'a>) -> KeyInfo<'a> {
    match &node.fragment {
        Fragment::PkK { key } | Fragment::PkH { key } => KeyInfo::from_keys(&[*key]),
        Fragment::Multi { keys, .. } | Fragment::MultiA { keys, .. } => KeyInfo::from_keys(keys),

        Fragment::AndOr { x, y, z } => key_info(ctx, ctx.get_node(*x))
            .merge(key_info(ctx, ctx.get_node(*y)))
            .merge(key_info(ctx, ctx.get_node(*z))),

        Fragment::AndV { x, y } | Fragment::AndB { x, y } => {
            key_info(ctx, ctx.get_node(*x)).merge(key_info(ctx, ctx.get_node(*y)))
        }
        Fragment::OrB { x, z }
        | Fragment::OrC { x, z }
        | Fragment::OrD { x, z }
        | Fragment::OrI { x, z } => {
            key_info(ctx, ctx.get_node(*x)).merge(key_info(ctx, ctx.get_node(*z)))
        }

        Fragment::Thresh { xs, .. } => {
            let mut acc = KeyInfo::empty();
            for x in xs {
                acc = acc.merge(key_info(ctx, ctx.get_node(*x)));
            }
            acc
        }

        Fragment::Wrapped { x, .. } => key_info(ctx, ctx.get_node(*x)),

        _ => KeyInfo::empty(),
    }
}

// Sanity

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone, Copy, PartialEq)]
pub enum SanityError {
    /// Some spending path requires no signature at all.
    SiglessBranch,
    /// A third party could rewrite some satisfaction.
    Malleable,
    /// The same key appears in sibling subtrees.
    RepeatedPubkeys,
    /// A conjunction mixes height- and time-based locks.
    HeightTimelockCombination,
    /// The expression is not a B-typed top level.
    NonTopLevel,
}

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone)]
pub enum AnalysisError {
    Type(TypeError),
    Sanity(SanityError),
}

/// Full analyzer record for one expression.
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct Analysis<'a> {
    pub valid: bool,
    pub error: Option<AnalysisError>,
    pub correctness: Option<TypeInfo>,
    pub malleability: Option<Malleability>,
    pub timelocks: TimelockInfo,
    pub keys: Vec<&'a str>,
    pub has_duplicate_keys: bool,
    pub issane: bool,
    pub issanesublevel: bool,
}

pub fn analyze_ast<'a>(ctx: &ParserContext<'a>, options: &AnalyzerContext) -> Analysis<'a> {
    let correctness = match CorrectnessVisitor::new(options.tapscript).visit(ctx) {
        Ok(type_info) => type_info,
        Err(e) => {
            return Analysis {
                valid: false,
                error: Some(AnalysisError::Type(e)),
                correctness: None,
                malleability: None,
                timelocks: TimelockInfo::default(),
                keys: Vec::new(),
                has_duplicate_keys: false,
                issane: false,
                issanesublevel: false,
            };
        }
    };

    let root = ctx.get_root();
    let malleability = malleability(ctx, root);
    let timelocks = timelock_info(ctx, root);
    let keys = key_info(ctx, root);

    let issanesublevel = malleability.signed
        && malleability.non_malleable
        && !timelocks.contains_combination
        && !keys.has_duplicate_keys;
    let issane = issanesublevel && correctness.base_type() == MiniscriptType::B;

    // First failing check wins.
    let sanity_error = if !malleability.signed {
        Some(SanityError::SiglessBranch)
    } else if !malleability.non_malleable {
        Some(SanityError::Malleable)
    } else if keys.has_duplicate_keys {
        Some(SanityError::RepeatedPubkeys)
    } else if timelocks.contains_combination {
        Some(SanityError::HeightTimelockCombination)
    } else if correctness.base_type() != MiniscriptType::B {
        Some(SanityError::NonTopLevel)
    } else {
        None
    };

    Analysis {
        valid: true,
        error: sanity_error.map(AnalysisError::Sanity),
        correctness: Some(correctness),
        malleability: Some(malleability),
        timelocks,
        keys: keys.keys.into_iter().collect(),
        has_duplicate_keys: keys.has_duplicate_keys,
        issane,
        issanesublevel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn analyze(expr: &str) -> Analysis<'_> {
        analyze_ast(&parse(expr).unwrap(), &AnalyzerContext::default())
    }

    #[test]
    fn sane_expression() {
        let analysis = analyze("and_v(v:pk(key),after(10))");
        assert!(analysis.valid && analysis.issane && analysis.issanesublevel);
        assert!(analysis.error.is_none());
        assert_eq!(analysis.keys, ["key"]);
        assert!(analysis.timelocks.cltv_with_height);
    }

    #[test]
    fn invalid_record_is_returned_not_thrown() {
        let analysis = analyze("and_v(pk(a),pk(b))");
        assert!(!analysis.valid);
        assert!(matches!(analysis.error, Some(AnalysisError::Type(_))));
        assert!(analysis.correctness.is_none());
        assert!(!analysis.issane);
    }

    #[test]
    fn sigless_branch_reported_first() {
        let analysis = analyze("older(100)");
        assert!(analysis.valid && !analysis.issane);
        assert!(matches!(
            analysis.error,
            Some(AnalysisError::Sanity(SanityError::SiglessBranch))
        ));
    }

    #[test]
    fn repeated_pubkeys_across_siblings() {
        let analysis = analyze("or_b(pk(A),a:pk(A))");
        assert!(analysis.has_duplicate_keys);
        assert!(matches!(
            analysis.error,
            Some(AnalysisError::Sanity(SanityError::RepeatedPubkeys))
        ));
    }

    #[test]
    fn duplicate_keys_inside_multi() {
        let analysis = analyze("multi(1,A,A)");
        assert!(analysis.has_duplicate_keys);
    }

    #[test]
    fn conjunction_latches_timelock_mix() {
        // 0x400001 has the type flag set: a time-based relative lock
        let analysis = analyze("and_v(v:pk(A),and_b(older(10),a:older(4194305)))");
        assert!(analysis.timelocks.csv_with_height);
        assert!(analysis.timelocks.csv_with_time);
        assert!(analysis.timelocks.contains_combination);
        assert!(matches!(
            analysis.error,
            Some(AnalysisError::Sanity(SanityError::HeightTimelockCombination))
        ));
    }

    #[test]
    fn disjunction_does_not_latch() {
        // the time-based lock sits on the alternative path
        let analysis = analyze("andor(pk(A),older(10),and_v(v:pk(B),older(4194305)))");
        assert!(analysis.timelocks.csv_with_height);
        assert!(analysis.timelocks.csv_with_time);
        assert!(!analysis.timelocks.contains_combination);
        assert!(analysis.issane);
    }

    #[test]
    fn non_top_level_is_sane_at_sublevel_only() {
        let analysis = analyze("v:pk(A)");
        assert!(analysis.issanesublevel);
        assert!(!analysis.issane);
        assert!(matches!(
            analysis.error,
            Some(AnalysisError::Sanity(SanityError::NonTopLevel))
        ));
    }
}
