use std::sync::{Arc, Mutex};

use cell_processors::context::CellContext;
use cell_processors::error::{ChainError, ErrorKind, Violation};
use cell_processors::processing::{
    build_chain, CapabilitySet, CellProcessor, CellResult, Chain, ConvertNullTo, DecimalFormatter,
    FmtNumber, ForbidSubStr, NumberPattern, ParseDouble, ParseLong, ProcessorConfig,
    StrNotNullOrEmpty, Trim,
};
use cell_processors::types::Value;

fn ctx() -> CellContext<'static> {
    CellContext::new(2, 1)
}

#[test]
fn number_formatter_then_not_empty() {
    let chain = Chain::builder()
        .then(FmtNumber::new("#.##").unwrap())
        .then(StrNotNullOrEmpty::new())
        .build()
        .unwrap();
    assert_eq!(chain.execute(3.14159, &ctx()).unwrap(), Value::from("3.14"));
}

#[test]
fn forbidden_substrings_then_not_empty() {
    let chain = Chain::builder()
        .accepting(CapabilitySet::TEXT)
        .then(ForbidSubStr::new(["foo", "bar"]))
        .then(StrNotNullOrEmpty::new())
        .build()
        .unwrap();

    let err = chain.execute("hello foo world", &ctx()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Constraint);
    assert_eq!(err.processor().name, "ForbidSubStr");
    assert_eq!(
        chain.execute("hello world", &ctx()).unwrap(),
        Value::from("hello world")
    );

    // the empty string passes the first link and fails the second
    let err = chain.execute("", &ctx()).unwrap_err();
    assert_eq!(err.processor().name, "StrNotNullOrEmpty");
    assert_eq!(err.processor().position, 2);
}

#[test]
fn text_chain_input_cannot_feed_a_number_formatter() {
    let err = Chain::builder()
        .accepting(CapabilitySet::TEXT)
        .then(Trim::new())
        .then(FmtNumber::new("0.00").unwrap())
        .build()
        .unwrap_err();
    match err {
        ChainError::Incompatible {
            position,
            upstream,
            downstream,
            ..
        } => {
            assert_eq!(position, 2);
            assert_eq!(upstream, "Trim");
            assert_eq!(downstream, "FmtNumber");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn error_carries_row_source() {
    let row = vec![Value::from("abc"), Value::from("other")];
    let ctx = CellContext::new(7, 1).with_row_source(&row);
    let chain = Chain::builder()
        .then(ParseDouble::new())
        .then(FmtNumber::new("0.0").unwrap())
        .build()
        .unwrap();

    let err = chain.execute(row[0].clone(), &ctx).unwrap_err();
    assert_eq!(err.location().row, 7);
    assert_eq!(err.location().row_source, row);
    assert_eq!(err.location().raw_value(), Some(&Value::from("abc")));
    assert!(err.to_string().starts_with("row 7 column 1: ParseDouble (link 1)"));
}

#[test]
fn convert_null_to_ends_the_chain() {
    let seen = Arc::new(Mutex::new(0usize));

    #[derive(Debug)]
    struct Count(Arc<Mutex<usize>>);

    impl CellProcessor for Count {
        fn name(&self) -> &'static str {
            "Count"
        }

        fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
            *self.0.lock().unwrap() += 1;
            Ok(value)
        }
    }

    let chain = Chain::builder()
        .then(ConvertNullTo::new(-1i64))
        .then(Count(Arc::clone(&seen)))
        .build()
        .unwrap();
    assert_eq!(chain.execute(Value::Null, &ctx()).unwrap(), Value::Int64(-1));
    assert_eq!(*seen.lock().unwrap(), 0);
    assert_eq!(chain.execute(5i64, &ctx()).unwrap(), Value::Int64(5));
    assert_eq!(*seen.lock().unwrap(), 1);
}

#[test]
fn custom_processor_violations_are_located() {
    #[derive(Debug)]
    struct Even;

    impl CellProcessor for Even {
        fn name(&self) -> &'static str {
            "Even"
        }

        fn accepts(&self) -> CapabilitySet {
            CapabilitySet::INTEGRAL
        }

        fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
            match value {
                Value::Int64(v) if v % 2 != 0 => Err(Violation::constraint("must be even", value)),
                other => Ok(other),
            }
        }
    }

    let chain = Chain::builder()
        .then(ParseLong::new())
        .then(Even)
        .build()
        .unwrap();
    assert_eq!(chain.execute("4", &ctx()).unwrap(), Value::Int64(4));
    let err = chain.execute("5", &ctx()).unwrap_err();
    assert_eq!(err.processor().position, 2);
    assert!(err.to_string().contains("must be even"));
}

#[test]
fn shared_chain_across_threads() {
    let shared = Arc::new(Mutex::new(DecimalFormatter::new(
        NumberPattern::parse("#,##0.###").unwrap(),
    )));
    let chain = Chain::builder()
        .then(ParseDouble::new())
        .then(FmtNumber::with_formatter(shared))
        .build()
        .unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let chain = &chain;
                s.spawn(move || {
                    (0..200)
                        .map(|i| {
                            let raw = format!("{}.5", t * 1000 + i);
                            chain.execute(raw, &CellContext::new(i + 1, 1)).unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for (t, handle) in handles.into_iter().enumerate() {
            let out = handle.join().unwrap();
            assert_eq!(out[0], Value::Utf8(format!("{}.5", group(t * 1000))));
        }
    });
}

fn group(v: usize) -> String {
    let digits = v.to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[test]
fn configured_chain_matches_hand_built_chain() {
    let configs = [
        ProcessorConfig::ParseDouble,
        ProcessorConfig::FmtNumber {
            pattern: "#.##".into(),
            decimal_separator: None,
            grouping_separator: None,
        },
        ProcessorConfig::StrNotNullOrEmpty,
    ];
    let configured = build_chain(&configs).unwrap();
    let by_hand = Chain::builder()
        .then(ParseDouble::new())
        .then(FmtNumber::new("#.##").unwrap())
        .then(StrNotNullOrEmpty::new())
        .build()
        .unwrap();

    for raw in ["3.14159", "0.005", "-12", "1e3"] {
        assert_eq!(
            configured.execute(raw, &ctx()).unwrap(),
            by_hand.execute(raw, &ctx()).unwrap()
        );
    }
    assert_eq!(
        configured.links().map(|l| l.processor().name()).collect::<Vec<_>>(),
        vec!["ParseDouble", "FmtNumber", "StrNotNullOrEmpty"]
    );
}
