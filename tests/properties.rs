use proptest::prelude::*;

use tinylisp::host::BufferIo;
use tinylisp::{Config, Interp, Value};

fn interp() -> Interp {
    Interp::with_io(Config::default(), Box::new(BufferIo::new(""))).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn addition_and_subtraction_wrap(a in 0i64..=i64::MAX, b in 0i64..=i64::MAX) {
        let mut lisp = interp();
        prop_assert_eq!(lisp.eval_str(&format!("(+ {a} {b})")).unwrap(), Value::Int(a.wrapping_add(b)));
        prop_assert_eq!(lisp.eval_str(&format!("(- {a} {b})")).unwrap(), Value::Int(a.wrapping_sub(b)));
        prop_assert_eq!(lisp.eval_str(&format!("(* {a} {b})")).unwrap(), Value::Int(a.wrapping_mul(b)));
    }

    #[test]
    fn division_matches_truncation(a in 0i64..1_000_000, b in 1i64..1000) {
        let mut lisp = interp();
        prop_assert_eq!(lisp.eval_str(&format!("(/ {a} {b})")).unwrap(), Value::Int(a / b));
        prop_assert_eq!(lisp.eval_str(&format!("(% {a} {b})")).unwrap(), Value::Int(a % b));
    }

    #[test]
    fn integer_lists_print_as_read(items in prop::collection::vec(0i64..100_000, 0..20)) {
        let src = format!(
            "(list {})",
            items.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" ")
        );
        let mut lisp = interp();
        let v = lisp.eval_str(&src).unwrap();
        let expected = format!(
            "({})",
            items.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" ")
        );
        prop_assert_eq!(lisp.render(v), expected);
    }

    #[test]
    fn concat_names_are_interned_once(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        let mut lisp = interp();
        lisp.eval_str("(prefix ' quote)").unwrap();
        let joined = lisp.eval_str(&format!("(concat '{a} '{b})")).unwrap();
        prop_assert_eq!(joined, lisp.intern(&format!("{a}{b}")));
    }

    #[test]
    fn collection_never_frees_global_structure(n in 1usize..300, events in 4usize..64) {
        let mut lisp = Interp::with_io(
            Config { gc_events: events, alloc_batch: 8, ..Config::default() },
            Box::new(BufferIo::new("")),
        ).unwrap();
        lisp.eval_str("(define build (lambda (n acc) (if (= n 0) acc (build (- n 1) (cons n acc)))))").unwrap();
        lisp.eval_str(&format!("(define keep (build {n} ()))")).unwrap();
        lisp.eval_str("(build 200 ())").unwrap();
        lisp.collect();
        prop_assert_eq!(lisp.eval_str("(length keep)").unwrap(), Value::Int(n as i64));
        prop_assert_eq!(lisp.eval_str("(car keep)").unwrap(), Value::Int(1));
    }
}
