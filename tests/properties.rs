use std::collections::BTreeSet;

use symscript::locks::{LockType, max_lock};
use symscript::parser::parse;
use symscript::satisfy::{SatisfyOptions, Solution};
use symscript::{analyze, analyzer::AnalyzerContext, satisfy};

const CORPUS: &[&str] = &[
    "0",
    "1",
    "pk_k(K)",
    "pk_h(K)",
    "pk(K)",
    "pkh(K)",
    "older(555)",
    "after(13)",
    "sha256(h)",
    "hash256(h)",
    "ripemd160(h)",
    "hash160(h)",
    "andor(pk(K),pk(A),pk(B))",
    "and_v(v:pk(K),pk(A))",
    "and_b(pk(K),s:pk(A))",
    "and_n(pk(K),pk(A))",
    "or_b(pk(K),s:pk(A))",
    "or_c(pk(K),v:pk(A))",
    "or_d(pk(K),pk(A))",
    "or_i(pk(K),pk(A))",
    "thresh(2,pk(K),s:pk(A),s:pk(B))",
    "multi(2,K,A,B)",
    "j:multi(1,K,A)",
    "a:pk(K)",
    "s:pk(K)",
    "c:pk_k(K)",
    "dv:older(1)",
    "n:pk(K)",
    "t:pk(K)",
    "l:pk(K)",
    "u:pk(K)",
    "av:1",
    "c:or_i(andor(c:pk_h(k1),pk_h(k2),pk_h(k3)),pk_k(k4))",
];

const SANE_CORPUS: &[&str] = &[
    "pk(key)",
    "multi(1,a,b)",
    "multi(2,a,b,c)",
    "or_b(pk(a),s:pk(b))",
    "t:or_c(pk(a),v:pk(b))",
    "or_d(pk(a),pk(b))",
    "or_i(pk(a),pk(b))",
    "andor(pk(a),pk(b),pk(c))",
    "thresh(2,pk(a),s:pk(b),s:pk(c))",
    "thresh(2,pk(A),s:pk(B),sln:1)",
    "and_v(v:pk(a),after(10))",
    "and_b(pk(a),s:pk(b))",
    "j:multi(1,k1,k2)",
    "c:or_i(andor(c:pk_h(k1),pk_h(k2),pk_h(k3)),pk_k(k4))",
    "and_v(v:pk(A),and_b(older(5),a:older(16)))",
];

fn signature_set(asm: &str) -> BTreeSet<&str> {
    asm.split_whitespace()
        .filter(|token| token.starts_with("<sig("))
        .collect()
}

#[test]
fn printing_reaches_a_fixpoint() {
    for expr in CORPUS {
        let canonical = parse(expr).unwrap().serialize();
        let reprinted = parse(&canonical).unwrap().serialize();
        assert_eq!(canonical, reprinted, "round-trip failed for {}", expr);
    }
}

#[test]
fn wrapper_prefix_reverses_into_nesting() {
    let merged = parse("asc:pk_k(K)").unwrap().serialize();
    let chained = parse("a:s:c:pk_k(K)").unwrap().serialize();
    assert_eq!(merged, chained);
    assert_eq!(merged, "a:s:c:pk_k(K)");
}

#[test]
fn analysis_and_satisfaction_are_deterministic() {
    for expr in SANE_CORPUS {
        let first = satisfy(expr, &SatisfyOptions::default()).unwrap();
        let second = satisfy(expr, &SatisfyOptions::default()).unwrap();
        assert_eq!(first.non_malleable_sats, second.non_malleable_sats);
        assert_eq!(first.malleable_sats, second.malleable_sats);
        assert_eq!(first.unknown_sats, second.unknown_sats);
    }
}

#[test]
fn max_lock_is_commutative_and_idempotent() {
    let samples = [None, Some(1), Some(10), Some(500_000_000)];
    for a in samples {
        for b in samples {
            assert_eq!(
                max_lock(a, b, LockType::Absolute),
                max_lock(b, a, LockType::Absolute)
            );
        }
        assert_eq!(max_lock(a, a, LockType::Absolute), Ok(a));
    }
}

#[test]
fn sane_satisfactions_always_carry_a_signature() {
    for expr in SANE_CORPUS {
        let analysis = analyze(expr, &AnalyzerContext::default()).unwrap();
        assert!(analysis.issane, "{} should be sane", expr);

        let satisfied = satisfy(expr, &SatisfyOptions::default()).unwrap();
        assert!(!satisfied.non_malleable_sats.is_empty());
        for solution in &satisfied.non_malleable_sats {
            assert!(
                solution.asm.contains("<sig("),
                "sigless non-malleable witness {:?} for {}",
                solution.asm,
                expr
            );
        }
    }
}

#[test]
fn no_non_malleable_witness_subsumes_another() {
    fn same_locks(a: &Solution, b: &Solution) -> bool {
        a.n_lock_time == b.n_lock_time && a.n_sequence == b.n_sequence
    }

    for expr in SANE_CORPUS {
        let satisfied = satisfy(expr, &SatisfyOptions::default()).unwrap();
        let sats = &satisfied.non_malleable_sats;
        for a in sats {
            for b in sats {
                if core::ptr::eq(a, b) || !same_locks(a, b) {
                    continue;
                }
                let set_a = signature_set(&a.asm);
                let set_b = signature_set(&b.asm);
                assert!(
                    !(set_b.is_subset(&set_a) && set_b != set_a),
                    "{:?} subsumes {:?} in {}",
                    a.asm,
                    b.asm,
                    expr
                );
            }
        }
    }
}

#[test]
fn weights_are_ascending() {
    fn weight(asm: &str) -> u32 {
        asm.split_whitespace()
            .map(|token| {
                if token == "0" || token == "1" {
                    1
                } else if token.starts_with("<sig(") {
                    74
                } else if token.contains("_preimage(") {
                    33
                } else {
                    34
                }
            })
            .sum()
    }

    for expr in SANE_CORPUS {
        let satisfied = satisfy(expr, &SatisfyOptions::default()).unwrap();
        let weights: Vec<u32> = satisfied
            .non_malleable_sats
            .iter()
            .map(|s| weight(&s.asm))
            .collect();
        let mut sorted = weights.clone();
        sorted.sort();
        assert_eq!(weights, sorted, "unsorted weights for {}", expr);
    }
}

#[test]
fn locks_accumulate_to_the_maximum_leaf() {
    let satisfied = satisfy(
        "and_v(v:pk(A),and_b(older(5),a:older(16)))",
        &SatisfyOptions::default(),
    )
    .unwrap();
    assert_eq!(satisfied.non_malleable_sats.len(), 1);
    assert_eq!(satisfied.non_malleable_sats[0].n_sequence, Some(16));
    assert_eq!(satisfied.non_malleable_sats[0].n_lock_time, None);
}
