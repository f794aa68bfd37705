use super::*;

fn map(pairs: &[(&str, Value)]) -> Value {
    let mut m = Mapping::new();
    for (k, v) in pairs {
        m.insert((*k).to_string(), v.clone());
    }
    Value::Mapping(m)
}

#[test]
fn scalar_later_wins() {
    let mut a = Value::String("a".into());
    a.deep_merge(Value::String("b".into()));
    assert_eq!(a, Value::String("b".into()));
}

#[test]
fn maps_merge_recursively_keeping_unshared_keys() {
    let mut a = map(&[
        ("x", Value::Int(1)),
        ("y", Value::Int(2)),
    ]);
    let b = map(&[("y", Value::Int(3)), ("z", Value::Int(4))]);
    a.deep_merge(b);

    let expected = map(&[
        ("x", Value::Int(1)),
        ("y", Value::Int(3)),
        ("z", Value::Int(4)),
    ]);
    assert_eq!(a, expected);
}

#[test]
fn nested_maps_merge_at_every_level() {
    let mut a = map(&[("outer", map(&[("inner", Value::Int(1))]))]);
    let b = map(&[("outer", map(&[("inner2", Value::Int(2))]))]);
    a.deep_merge(b);

    let expected = map(&[(
        "outer",
        map(&[("inner", Value::Int(1)), ("inner2", Value::Int(2))]),
    )]);
    assert_eq!(a, expected);
}

#[test]
fn non_map_other_replaces_map_self() {
    let mut a = map(&[("x", Value::Int(1))]);
    a.deep_merge(Value::String("replaced".into()));
    assert_eq!(a, Value::String("replaced".into()));
}
