//! Query construction: source text to operation graphs, and the wire
//! round-trip law for operation specs.

use ifql::{compile_spec, OperationSpec};
use ifql_ast::{
    ArrowFunctionExpression, BinaryExpression, BinaryOperator, Expression, Identifier,
    MemberExpression,
};
use ifql_core::ops::*;
use ifql_core::spec::{Edge, Operation, QuerySpec};
use ifql_core::time::{Duration, OpTime, Time};

#[test]
fn from_range_chain() {
    let spec = compile_spec(r#"var a = from(db:"dbA").range(start:-1h)"#).unwrap();
    let want = QuerySpec {
        operations: vec![
            Operation {
                id: "from0".into(),
                spec: OperationSpec::From(FromOpSpec {
                    database: "dbA".into(),
                }),
            },
            Operation {
                id: "range1".into(),
                spec: OperationSpec::Range(RangeOpSpec {
                    start: OpTime::relative(Duration::hours(-1)),
                    stop: OpTime::now(),
                }),
            },
        ],
        edges: vec![Edge {
            parent: "from0".into(),
            child: "range1".into(),
        }],
    };
    assert_eq!(spec, want);
}

fn value_member(param: &str) -> Expression {
    Expression::Member(Box::new(MemberExpression {
        object: Expression::ident(param),
        property: Expression::string("_value"),
    }))
}

#[test]
fn two_way_join() {
    let spec = compile_spec(
        r#"
var a = from(db:"dbA").range(start:-1h)
var b = from(db:"dbB").range(start:-1h)
join(tables:[a,b], on:["host"], f: (a,b) => a["_value"] + b["_value"])
"#,
    )
    .unwrap();

    let range = OperationSpec::Range(RangeOpSpec {
        start: OpTime::relative(Duration::hours(-1)),
        stop: OpTime::now(),
    });
    let want = QuerySpec {
        operations: vec![
            Operation {
                id: "from0".into(),
                spec: OperationSpec::From(FromOpSpec {
                    database: "dbA".into(),
                }),
            },
            Operation {
                id: "range1".into(),
                spec: range.clone(),
            },
            Operation {
                id: "from2".into(),
                spec: OperationSpec::From(FromOpSpec {
                    database: "dbB".into(),
                }),
            },
            Operation {
                id: "range3".into(),
                spec: range,
            },
            Operation {
                id: "join4".into(),
                spec: OperationSpec::Join(JoinOpSpec {
                    on: vec!["host".into()],
                    expression: ArrowFunctionExpression {
                        params: vec![Identifier::new("a"), Identifier::new("b")],
                        body: Expression::Binary(Box::new(BinaryExpression {
                            operator: BinaryOperator::Add,
                            left: value_member("a"),
                            right: value_member("b"),
                        })),
                    },
                }),
            },
        ],
        edges: vec![
            Edge {
                parent: "from0".into(),
                child: "range1".into(),
            },
            Edge {
                parent: "from2".into(),
                child: "range3".into(),
            },
            Edge {
                parent: "range1".into(),
                child: "join4".into(),
            },
            Edge {
                parent: "range3".into(),
                child: "join4".into(),
            },
        ],
    };
    assert_eq!(spec, want);
}

#[test]
fn join_with_complex_expression() {
    let spec = compile_spec(
        r#"
var a = from(db:"ifql").range(start:-1h)
var b = from(db:"ifql").range(start:-1h)
join(tables:[a,b], on:["t1"], f: (a,b) => (a["_value"]-b["_value"])/b["_value"])
"#,
    )
    .unwrap();
    let OperationSpec::Join(join) = &spec.operations[4].spec else {
        panic!("expected join operation");
    };
    let Expression::Binary(div) = &join.expression.body else {
        panic!("expected binary body");
    };
    assert_eq!(div.operator, BinaryOperator::Div);
    let Expression::Binary(sub) = &div.left else {
        panic!("expected subtraction on the left");
    };
    assert_eq!(sub.operator, BinaryOperator::Sub);
}

#[test]
fn join_cannot_be_chained() {
    let err = compile_spec(
        r#"
var a = from(db:"dbA").range(start:-1h)
var b = from(db:"dbB").range(start:-1h)
a.join(tables:[a,b], on:["host"], f: (a,b) => a["_value"] + b["_value"])
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("chained"), "got: {err}");
}

#[test]
fn unknown_function_fails() {
    let err = compile_spec(r#"from(db:"x").explode()"#).unwrap_err();
    assert!(matches!(err, ifql::Error::UnknownFunction(name) if name == "explode"));
}

#[test]
fn operation_spec_wire_round_trip() {
    let specs = vec![
        OperationSpec::From(FromOpSpec {
            database: "mydb".into(),
        }),
        OperationSpec::Range(RangeOpSpec {
            start: OpTime::relative(Duration::hours(-1)),
            stop: OpTime::absolute(Time(1_000)),
        }),
        OperationSpec::Limit(LimitOpSpec { n: 10 }),
        OperationSpec::Window(WindowOpSpec {
            every: Duration::minutes(5),
            period: Duration::minutes(10),
            start: OpTime::default(),
        }),
        OperationSpec::Merge(MergeOpSpec {
            keys: vec!["host".into()],
        }),
        OperationSpec::Join(JoinOpSpec {
            on: vec!["t1".into(), "t2".into()],
            expression: ArrowFunctionExpression {
                params: vec![Identifier::new("a"), Identifier::new("b")],
                body: Expression::Binary(Box::new(BinaryExpression {
                    operator: BinaryOperator::Add,
                    left: value_member("a"),
                    right: value_member("b"),
                })),
            },
        }),
        OperationSpec::Count(CountOpSpec {}),
        OperationSpec::Stddev(StddevOpSpec {}),
        OperationSpec::Max(MaxOpSpec {
            options: SelectorOptions {
                column: Some("x".into()),
                use_start_time: true,
                use_row_time: false,
            },
        }),
    ];
    for spec in specs {
        let json = serde_json::to_string(&spec).unwrap();
        let back: OperationSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec, "round trip failed for {json}");
    }
}

#[test]
fn join_operation_marshals_with_tagged_ast() {
    let op = Operation {
        id: "join".into(),
        spec: OperationSpec::Join(JoinOpSpec {
            on: vec!["t1".into(), "t2".into()],
            expression: ArrowFunctionExpression {
                params: vec![Identifier::new("a"), Identifier::new("b")],
                body: Expression::Binary(Box::new(BinaryExpression {
                    operator: BinaryOperator::Add,
                    left: value_member("a"),
                    right: value_member("b"),
                })),
            },
        }),
    };
    let json = serde_json::to_value(&op).unwrap();
    assert_eq!(json["id"], "join");
    assert_eq!(json["kind"], "join");
    assert_eq!(json["spec"]["on"][0], "t1");
    assert_eq!(json["spec"]["expression"]["params"][0]["name"], "a");
    assert_eq!(json["spec"]["expression"]["body"]["type"], "BinaryExpression");
    assert_eq!(json["spec"]["expression"]["body"]["operator"], "+");

    let back: Operation = serde_json::from_value(json).unwrap();
    assert_eq!(back, op);
}

#[test]
fn stringify_parses_back_to_same_graph() {
    let sources = [
        r#"var a = from(db:"dbA").range(start:-1h)"#,
        r#"from(db:"d").range(start:0, stop:10).window(every:5ns).count()"#,
        r#"from(db:"d").where(exp:{("t1" == "a") or $ > 2}).range(start:-30m).limit(n:3)"#,
    ];
    for src in sources {
        let printed = ifql_lang::parse(src).unwrap().to_string();
        assert_eq!(
            compile_spec(src).unwrap(),
            compile_spec(&printed).unwrap(),
            "stringified program built a different graph for {src:?}"
        );
    }
}
