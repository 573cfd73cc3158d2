use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use crate::analyzer::{AnalysisError, AnalyzerContext, analyze_ast};
use crate::locks::{self, LockError, LockType};
use crate::parser::{AST, Fragment, ParserContext, WrapperType};

pub const DEFAULT_MAX_SOLUTIONS: usize = 1000;

/// One symbolic witness: a space-separated token list (leftmost = stack
/// top) plus the locks it needs.
#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone, PartialEq)]
pub struct Solution {
    pub asm: String,
    pub n_lock_time: Option<u32>,
    pub n_sequence: Option<u32>,
}

impl Solution {
    fn witness(asm: impl Into<String>) -> Self {
        Self {
            asm: asm.into(),
            n_lock_time: None,
            n_sequence: None,
        }
    }
}

/// All satisfying and dissatisfying witnesses of a subtree.
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct Satisfactions {
    pub sats: Vec<Solution>,
    pub dsats: Vec<Solution>,
}

#[derive(Clone)]
pub struct SatisfyOptions {
    pub tapscript: bool,
    pub unknowns: Option<Vec<String>>,
    pub knowns: Option<Vec<String>>,
    pub max_solutions: usize,
}

impl Default for SatisfyOptions {
    fn default() -> Self {
        Self {
            tapscript: false,
            unknowns: None,
            knowns: None,
            max_solutions: DEFAULT_MAX_SOLUTIONS,
        }
    }
}

/// Classified satisfactions of a sane expression.
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct Satisfied {
    pub non_malleable_sats: Vec<Solution>,
    pub malleable_sats: Vec<Solution>,
    pub unknown_sats: Vec<Solution>,
}

#[cfg_attr(feature = "debug", derive(Debug))]
#[derive(Clone)]
pub enum SatisfyError {
    /// The expression failed analysis; the analyzer error is the cause.
    NotSane { cause: AnalysisError },
    /// `unknowns` and `knowns` cannot both be given.
    ConflictingOptions,
    /// Enumeration exceeded `max_solutions`.
    TooManySolutions { limit: usize },
    /// A witness token the weight table does not know.
    UnknownWitnessToken { token: String },
    Lock(LockError),
}

impl From<LockError> for SatisfyError {
    fn from(e: LockError) -> Self {
        SatisfyError::Lock(e)
    }
}

// Enumeration never truncates: past the cap it aborts loudly.
struct Enumerator {
    produced: usize,
    limit: usize,
}

impl Enumerator {
    fn new(limit: usize) -> Self {
        Self { produced: 0, limit }
    }

    fn charge(&mut self) -> Result<(), SatisfyError> {
        self.produced += 1;
        if self.produced > self.limit {
            return Err(SatisfyError::TooManySolutions { limit: self.limit });
        }
        Ok(())
    }
}

fn normalize(asm: &str) -> String {
    let mut out = String::new();
    for token in asm.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(token);
    }
    out
}

// Template engine. A template is a literal token string interleaved with
// sat(i)/dsat(i) markers referring to child solution sets.

struct Marker {
    start: usize,
    end: usize,
    dsat: bool,
    id: usize,
}

fn find_marker(template: &str) -> Option<Marker> {
    let mut i = 0;
    while i < template.len() {
        let rest = &template[i..];
        let (dsat, head) = if rest.starts_with("dsat(") {
            (true, 5)
        } else if rest.starts_with("sat(") {
            (false, 4)
        } else {
            i += 1;
            continue;
        };
        let close = rest[head..].find(')')?;
        let id = rest[head..head + close].parse().ok()?;
        return Some(Marker {
            start: i,
            end: i + head + close + 1,
            dsat,
            id,
        });
    }
    None
}

// Resolve the leftmost marker against the child solutions and cross-product
// with the resolved tail; locks merge by maximum.
fn combine(
    template: &str,
    children: &[Satisfactions],
    enumerator: &mut Enumerator,
) -> Result<Vec<Solution>, SatisfyError> {
    let marker = match find_marker(template) {
        Some(marker) => marker,
        None => return Ok(vec![Solution::witness(normalize(template))]),
    };

    let pre = &template[..marker.start];
    let post = &template[marker.end..];
    let pool = if marker.dsat {
        &children[marker.id].dsats
    } else {
        &children[marker.id].sats
    };

    let tails = combine(post, children, enumerator)?;

    let mut out = Vec::new();
    for child in pool {
        for tail in &tails {
            enumerator.charge()?;
            out.push(Solution {
                asm: normalize(&format!("{} {} {}", pre, child.asm, tail.asm)),
                n_lock_time: locks::max_lock(
                    child.n_lock_time,
                    tail.n_lock_time,
                    LockType::Absolute,
                )?,
                n_sequence: locks::max_lock(
                    child.n_sequence,
                    tail.n_sequence,
                    LockType::Relative,
                )?,
            });
        }
    }
    Ok(out)
}

fn templated(
    children: &[Satisfactions],
    sat_templates: &[&str],
    dsat_templates: &[&str],
    enumerator: &mut Enumerator,
) -> Result<Satisfactions, SatisfyError> {
    let mut sats = Vec::new();
    for template in sat_templates {
        sats.extend(combine(template, children, enumerator)?);
    }
    let mut dsats = Vec::new();
    for template in dsat_templates {
        dsats.extend(combine(template, children, enumerator)?);
    }
    Ok(Satisfactions { sats, dsats })
}

// Visit every k-element index combination in lexicographic order.
fn for_each_combination<F>(n: usize, k: usize, f: &mut F) -> Result<(), SatisfyError>
where
    F: FnMut(&[usize]) -> Result<(), SatisfyError>,
{
    fn rec<F>(
        start: usize,
        n: usize,
        remaining: usize,
        current: &mut Vec<usize>,
        f: &mut F,
    ) -> Result<(), SatisfyError>
    where
        F: FnMut(&[usize]) -> Result<(), SatisfyError>,
    {
        if remaining == 0 {
            return f(current);
        }
        for i in start..=n - remaining {
            current.push(i);
            rec(i + 1, n, remaining - 1, current, f)?;
            current.pop();
        }
        Ok(())
    }

    if k > n {
        return Ok(());
    }
    rec(0, n, k, &mut Vec::new(), f)
}

// Items pushed later sit earlier in the serialized witness, so assignments
// list the last child first.
fn assignment_template(n: usize, selected: impl Fn(usize) -> bool) -> String {
    let mut template = String::new();
    for i in (0..n).rev() {
        if !template.is_empty() {
            template.push(' ');
        }
        if selected(i) {
            template.push_str(&format!("sat({})", i));
        } else {
            template.push_str(&format!("dsat({})", i));
        }
    }
    template
}

fn satisfactions<'a>(
    ctx: &ParserContext<'a>,
    node: &AST<'a>,
    enumerator: &mut Enumerator,
) -> Result<Satisfactions, SatisfyError> {
    match &node.fragment {
        Fragment::False => Ok(Satisfactions {
            sats: vec![],
            dsats: vec![Solution::witness("")],
        }),
        Fragment::True => Ok(Satisfactions {
            sats: vec![Solution::witness("")],
            dsats: vec![],
        }),

        Fragment::PkK { key } => Ok(Satisfactions {
            sats: vec![Solution::witness(format!("<sig({})>", key))],
            dsats: vec![Solution::witness("0")],
        }),
        Fragment::PkH { key } => Ok(Satisfactions {
            sats: vec![Solution::witness(format!("<sig({0})> <{0}>", key))],
            dsats: vec![Solution::witness(format!("0 <{}>", key))],
        }),

        Fragment::Older { n } => Ok(Satisfactions {
            sats: vec![Solution {
                asm: String::new(),
                n_lock_time: None,
                n_sequence: Some(*n),
            }],
            dsats: vec![],
        }),
        Fragment::After { n } => Ok(Satisfactions {
            sats: vec![Solution {
                asm: String::new(),
                n_lock_time: Some(*n),
                n_sequence: None,
            }],
            dsats: vec![],
        }),

        Fragment::Sha256 { h } => Ok(preimage_satisfactions("sha256", h)),
        Fragment::Hash256 { h } => Ok(preimage_satisfactions("hash256", h)),
        Fragment::Ripemd160 { h } => Ok(preimage_satisfactions("ripemd160", h)),
        Fragment::Hash160 { h } => Ok(preimage_satisfactions("hash160", h)),

        Fragment::AndOr { x, y, z } => {
            let children = [
                satisfactions(ctx, ctx.get_node(*x), enumerator)?,
                satisfactions(ctx, ctx.get_node(*y), enumerator)?,
                satisfactions(ctx, ctx.get_node(*z), enumerator)?,
            ];
            templated(
                &children,
                &["sat(1) sat(0)", "sat(2) dsat(0)"],
                &["dsat(2) dsat(0)", "dsat(1) sat(0)"],
                enumerator,
            )
        }
        Fragment::AndV { x, y } => {
            let children = [
                satisfactions(ctx, ctx.get_node(*x), enumerator)?,
                satisfactions(ctx, ctx.get_node(*y), enumerator)?,
            ];
            templated(&children, &["sat(1) sat(0)"], &["dsat(1) sat(0)"], enumerator)
        }
        Fragment::AndB { x, y } => {
            let children = [
                satisfactions(ctx, ctx.get_node(*x), enumerator)?,
                satisfactions(ctx, ctx.get_node(*y), enumerator)?,
            ];
            templated(
                &children,
                &["sat(1) sat(0)"],
                &["dsat(1) dsat(0)", "sat(1) dsat(0)", "dsat(1) sat(0)"],
                enumerator,
            )
        }
        Fragment::OrB { x, z } => {
            let children = [
                satisfactions(ctx, ctx.get_node(*x), enumerator)?,
                satisfactions(ctx, ctx.get_node(*z), enumerator)?,
            ];
            templated(
                &children,
                &["dsat(1) sat(0)", "sat(1) dsat(0)", "sat(1) sat(0)"],
                &["dsat(1) dsat(0)"],
                enumerator,
            )
        }
        Fragment::OrC { x, z } => {
            let children = [
                satisfactions(ctx, ctx.get_node(*x), enumerator)?,
                satisfactions(ctx, ctx.get_node(*z), enumerator)?,
            ];
            templated(&children, &["sat(0)", "sat(1) dsat(0)"], &[], enumerator)
        }
        Fragment::OrD { x, z } => {
            let children = [
                satisfactions(ctx, ctx.get_node(*x), enumerator)?,
                satisfactions(ctx, ctx.get_node(*z), enumerator)?,
            ];
            templated(
                &children,
                &["sat(0)", "sat(1) dsat(0)"],
                &["dsat(1) dsat(0)"],
                enumerator,
            )
        }
        Fragment::OrI { x, z } => {
            let children = [
                satisfactions(ctx, ctx.get_node(*x), enumerator)?,
                satisfactions(ctx, ctx.get_node(*z), enumerator)?,
            ];
            templated(
                &children,
                &["sat(0) 1", "sat(1) 0"],
                &["dsat(0) 1", "dsat(1) 0"],
                enumerator,
            )
        }

        Fragment::Thresh { k, xs } => {
            let mut subs = Vec::new();
            for x in xs {
                subs.push(satisfactions(ctx, ctx.get_node(*x), enumerator)?);
            }
            let n = xs.len();

            // every reverse-ordered assignment with exactly k sats
            let mut sats = Vec::new();
            for_each_combination(n, *k, &mut |combo| {
                enumerator.charge()?;
                let template = assignment_template(n, |i| combo.contains(&i));
                sats.extend(combine(&template, &subs, enumerator)?);
                Ok(())
            })?;

            // the all-dsat assignment plus every assignment with #sats != k
            let mut dsats = Vec::new();
            let total = 1usize.checked_shl(n as u32).unwrap_or(usize::MAX);
            for mask in 0..total {
                enumerator.charge()?;
                if mask.count_ones() as usize == *k {
                    continue;
                }
                let template = assignment_template(n, |i| mask & (1 << i) != 0);
                dsats.extend(combine(&template, &subs, enumerator)?);
            }

            Ok(Satisfactions { sats, dsats })
        }

        Fragment::Multi { k, keys } => {
            // every k-of-n key combination in index order, with the
            // CHECKMULTISIG dummy in front
            let mut sats = Vec::new();
            for_each_combination(keys.len(), *k, &mut |combo| {
                enumerator.charge()?;
                let mut asm = String::from("0");
                for i in combo {
                    asm.push_str(&format!(" <sig({})>", keys[*i]));
                }
                sats.push(Solution::witness(asm));
                Ok(())
            })?;

            Ok(Satisfactions {
                sats,
                dsats: vec![Solution::witness(vec!["0"; k + 1].join(" "))],
            })
        }
        Fragment::MultiA { k, keys } => {
            // one witness slot per key, first key leftmost; unused slots
            // hold the empty push
            let n = keys.len();
            let mut sats = Vec::new();
            for_each_combination(n, *k, &mut |combo| {
                enumerator.charge()?;
                let mut slots = Vec::with_capacity(n);
                for i in 0..n {
                    if combo.contains(&i) {
                        slots.push(format!("<sig({})>", keys[i]));
                    } else {
                        slots.push(String::from("0"));
                    }
                }
                sats.push(Solution::witness(slots.join(" ")));
                Ok(())
            })?;

            Ok(Satisfactions {
                sats,
                dsats: vec![Solution::witness(vec!["0"; n].join(" "))],
            })
        }

        Fragment::Wrapped { wrapper, x } => {
            let child = satisfactions(ctx, ctx.get_node(*x), enumerator)?;
            match wrapper {
                WrapperType::A | WrapperType::S | WrapperType::C | WrapperType::N => Ok(child),
                WrapperType::D => templated(&[child], &["sat(0) 1"], &["0"], enumerator),
                WrapperType::V => templated(&[child], &["sat(0)"], &[], enumerator),
                WrapperType::J => {
                    // nonzero dissatisfactions of the child stay valid
                    // alongside the canonical 0
                    let mut dsats = vec![Solution::witness("0")];
                    for dsat in &child.dsats {
                        if matches!(dsat.asm.split_whitespace().last(), Some(t) if t != "0") {
                            dsats.push(dsat.clone());
                        }
                    }
                    Ok(Satisfactions {
                        sats: child.sats,
                        dsats,
                    })
                }
            }
        }
    }
}

fn preimage_satisfactions(hash_func: &str, h: &str) -> Satisfactions {
    Satisfactions {
        sats: vec![Solution::witness(format!("<{}_preimage({})>", hash_func, h))],
        dsats: vec![Solution::witness("<random_preimage()>")],
    }
}

// Classification

fn signature_set(asm: &str) -> BTreeSet<&str> {
    asm.split_whitespace()
        .filter(|token| token.starts_with("<sig("))
        .collect()
}

fn token_weight(token: &str) -> Result<u32, SatisfyError> {
    if token == "0" || token == "1" {
        Ok(1)
    } else if token.starts_with("<sig(") {
        Ok(74)
    } else if token.contains("_preimage(") {
        Ok(33)
    } else if token.starts_with('<') && token.ends_with('>') {
        // pubkey push
        Ok(34)
    } else {
        Err(SatisfyError::UnknownWitnessToken {
            token: token.to_string(),
        })
    }
}

fn witness_weight(asm: &str) -> Result<u32, SatisfyError> {
    let mut weight = 0;
    for token in asm.split_whitespace() {
        weight += token_weight(token)?;
    }
    Ok(weight)
}

fn classify(sats: Vec<Solution>, options: &SatisfyOptions) -> Result<Satisfied, SatisfyError> {
    // Split off candidates that need information the caller does not have.
    let mut unknown_sats = Vec::new();
    let mut candidates = Vec::new();
    match (&options.unknowns, &options.knowns) {
        (Some(_), Some(_)) => return Err(SatisfyError::ConflictingOptions),
        (Some(unknowns), None) => {
            for solution in sats {
                if unknowns.iter().any(|u| solution.asm.contains(u.as_str())) {
                    unknown_sats.push(solution);
                } else {
                    candidates.push(solution);
                }
            }
        }
        (None, Some(knowns)) => {
            for solution in sats {
                let mut residual = solution.asm.clone();
                for known in knowns {
                    residual = residual.replace(known.as_str(), "");
                }
                if residual.contains("<sig(") || residual.contains("_preimage(") {
                    unknown_sats.push(solution);
                } else {
                    candidates.push(solution);
                }
            }
        }
        (None, None) => candidates = sats,
    }

    struct Candidate {
        solution: Solution,
        weight: u32,
        dont_use: bool,
    }

    let mut ranked = Vec::new();
    for solution in candidates {
        let sigs = signature_set(&solution.asm);
        // sigless or guessable witnesses are malleable by construction
        let dont_use = sigs.is_empty() || solution.asm.contains("<random_preimage()>");
        ranked.push(Candidate {
            weight: witness_weight(&solution.asm)?,
            solution,
            dont_use,
        });
    }

    ranked.sort_by_key(|candidate| candidate.weight);

    // A witness whose signature set covers another witness with the same
    // locks can be stripped down to it by a third party.
    for i in 0..ranked.len() {
        for j in 0..ranked.len() {
            if i == j || ranked[i].dont_use {
                continue;
            }
            let a = &ranked[i].solution;
            let b = &ranked[j].solution;
            if a.n_lock_time != b.n_lock_time || a.n_sequence != b.n_sequence {
                continue;
            }
            if signature_set(&b.asm).is_subset(&signature_set(&a.asm)) {
                ranked[i].dont_use = true;
            }
        }
    }

    let mut non_malleable_sats = Vec::new();
    let mut malleable_sats = Vec::new();
    for candidate in ranked {
        if candidate.dont_use {
            malleable_sats.push(candidate.solution);
        } else {
            non_malleable_sats.push(candidate.solution);
        }
    }

    Ok(Satisfied {
        non_malleable_sats,
        malleable_sats,
        unknown_sats,
    })
}

/// Enumerate and classify all satisfactions of a sane expression.
pub fn satisfy_ast<'a>(
    ctx: &ParserContext<'a>,
    options: &SatisfyOptions,
) -> Result<Satisfied, SatisfyError> {
    if options.unknowns.is_some() && options.knowns.is_some() {
        return Err(SatisfyError::ConflictingOptions);
    }

    let analysis = analyze_ast(
        ctx,
        &AnalyzerContext {
            tapscript: options.tapscript,
        },
    );
    if let Some(cause) = analysis.error {
        return Err(SatisfyError::NotSane { cause });
    }

    let mut enumerator = Enumerator::new(options.max_solutions);
    let all = satisfactions(ctx, ctx.get_root(), &mut enumerator)?;
    classify(all.sats, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn satisfy(expr: &str) -> Satisfied {
        parse(expr).unwrap().satisfy(&SatisfyOptions::default()).unwrap()
    }

    fn asms(solutions: &[Solution]) -> Vec<&str> {
        solutions.iter().map(|s| s.asm.as_str()).collect()
    }

    #[test]
    fn combine_resolves_markers_left_to_right() {
        let children = [Satisfactions {
            sats: vec![Solution::witness("<sig(a)>")],
            dsats: vec![Solution::witness("0")],
        }];
        let mut enumerator = Enumerator::new(DEFAULT_MAX_SOLUTIONS);
        let solutions = combine("dsat(0) sat(0) 1", &children, &mut enumerator).unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].asm, "0 <sig(a)> 1");
    }

    #[test]
    fn combine_merges_locks_by_maximum() {
        let children = [
            Satisfactions {
                sats: vec![Solution {
                    asm: String::new(),
                    n_lock_time: None,
                    n_sequence: Some(5),
                }],
                dsats: vec![],
            },
            Satisfactions {
                sats: vec![Solution {
                    asm: String::new(),
                    n_lock_time: None,
                    n_sequence: Some(10),
                }],
                dsats: vec![],
            },
        ];
        let mut enumerator = Enumerator::new(DEFAULT_MAX_SOLUTIONS);
        let solutions = combine("sat(1) sat(0)", &children, &mut enumerator).unwrap();
        assert_eq!(solutions[0].n_sequence, Some(10));
    }

    #[test]
    fn single_key() {
        let satisfied = satisfy("pk(key)");
        assert_eq!(asms(&satisfied.non_malleable_sats), ["<sig(key)>"]);
        assert!(satisfied.malleable_sats.is_empty());
        assert!(satisfied.unknown_sats.is_empty());
    }

    #[test]
    fn timelocked_key_carries_the_lock() {
        let satisfied = satisfy("and_v(v:pk(key),after(10))");
        assert_eq!(satisfied.non_malleable_sats.len(), 1);
        let solution = &satisfied.non_malleable_sats[0];
        assert_eq!(solution.asm, "<sig(key)>");
        assert_eq!(solution.n_lock_time, Some(10));
        assert_eq!(solution.n_sequence, None);
    }

    #[test]
    fn multisig_enumerates_key_combinations() {
        let satisfied = satisfy("multi(1,key1,key2)");
        assert_eq!(
            asms(&satisfied.non_malleable_sats),
            ["0 <sig(key1)>", "0 <sig(key2)>"]
        );
        assert!(satisfied.malleable_sats.is_empty());
    }

    #[test]
    fn or_b_strips_overcomplete_branch() {
        let satisfied = satisfy("or_b(pk(a),s:pk(b))");
        assert_eq!(
            asms(&satisfied.non_malleable_sats),
            ["0 <sig(a)>", "<sig(b)> 0"]
        );
        // both signatures at once can be stripped down to either branch
        assert_eq!(asms(&satisfied.malleable_sats), ["<sig(b)> <sig(a)>"]);
    }

    #[test]
    fn not_sane_is_refused_with_cause() {
        let ctx = parse("or_b(l:after(100),al:after(200))").unwrap();
        assert!(matches!(
            ctx.satisfy(&SatisfyOptions::default()),
            Err(SatisfyError::NotSane { .. })
        ));
    }

    #[test]
    fn conflicting_options_are_refused() {
        let ctx = parse("pk(key)").unwrap();
        let options = SatisfyOptions {
            unknowns: Some(vec!["<sig(key)>".into()]),
            knowns: Some(vec![]),
            ..SatisfyOptions::default()
        };
        assert!(matches!(
            ctx.satisfy(&options),
            Err(SatisfyError::ConflictingOptions)
        ));
    }

    #[test]
    fn unknown_fingerprints_move_candidates_aside() {
        let ctx = parse("multi(1,key1,key2)").unwrap();
        let options = SatisfyOptions {
            unknowns: Some(vec!["<sig(key2)>".into()]),
            ..SatisfyOptions::default()
        };
        let satisfied = ctx.satisfy(&options).unwrap();
        assert_eq!(asms(&satisfied.non_malleable_sats), ["0 <sig(key1)>"]);
        assert_eq!(asms(&satisfied.unknown_sats), ["0 <sig(key2)>"]);
    }

    #[test]
    fn knowns_mode_keeps_only_fully_known_candidates() {
        let ctx = parse("or_b(pk(a),s:pk(b))").unwrap();
        let options = SatisfyOptions {
            knowns: Some(vec!["<sig(a)>".into()]),
            ..SatisfyOptions::default()
        };
        let satisfied = ctx.satisfy(&options).unwrap();
        assert_eq!(asms(&satisfied.non_malleable_sats), ["0 <sig(a)>"]);
        assert_eq!(satisfied.unknown_sats.len(), 2);
    }

    #[test]
    fn solution_cap_aborts_loudly() {
        let ctx = parse("thresh(2,pk(a),s:pk(b),s:pk(c),s:pk(d))").unwrap();
        let options = SatisfyOptions {
            max_solutions: 3,
            ..SatisfyOptions::default()
        };
        assert!(matches!(
            ctx.satisfy(&options),
            Err(SatisfyError::TooManySolutions { limit: 3 })
        ));
    }

    #[test]
    fn hash_preimage_dissatisfaction_is_malleable() {
        // sha256 sits on the mandatory path; its preimage is the witness
        let satisfied = satisfy("and_v(v:pk(a),sha256(h))");
        assert_eq!(
            asms(&satisfied.non_malleable_sats),
            ["<sha256_preimage(h)> <sig(a)>"]
        );
    }
}
