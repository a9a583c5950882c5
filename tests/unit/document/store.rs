use super::*;
use crate::document::model::{LayerKind, Shape};

fn shape(id: &str) -> LayerSpec {
    LayerSpec::leaf(Layer::shape(
        id,
        Shape {
            path: "M0 0 L4 0 L4 4 Z".to_string(),
            ..Default::default()
        },
    ))
}

fn tree() -> LayerStore {
    let spec = LayerSpec::group(
        Layer::group("root"),
        vec![
            shape("a"),
            LayerSpec::group(Layer::group("g"), vec![shape("b"), shape("c")]),
        ],
    );
    LayerStore::from_spec(&spec).unwrap()
}

#[test]
fn builds_links_from_spec() {
    let store = tree();
    assert_eq!(store.len(), 5);
    assert_eq!(store.root(), "root");
    assert_eq!(store.entry("root").unwrap().children, vec!["a", "g"]);
    assert_eq!(store.entry("c").unwrap().parent.as_deref(), Some("g"));
    assert_eq!(store.subtree("root").unwrap(), vec!["root", "a", "g", "b", "c"]);
}

#[test]
fn duplicate_ids_are_rejected() {
    let spec = LayerSpec::group(Layer::group("root"), vec![shape("a"), shape("a")]);
    let err = LayerStore::from_spec(&spec).unwrap_err();
    assert!(matches!(err, RendexError::DuplicateLayerId(id) if id == "a"));
}

#[test]
fn children_need_a_group() {
    let mut leaf = shape("a");
    leaf.children.push(shape("b"));
    let err = LayerStore::from_spec(&leaf).unwrap_err();
    assert!(matches!(err, RendexError::WrongLayerType(_)));
}

#[test]
fn singular_layer_transform_is_rejected() {
    let mut spec = shape("a");
    spec.layer.transform = [1.0, 0.0, 2.0, 0.0, 0.0, 0.0];
    let err = LayerStore::from_spec(&spec).unwrap_err();
    assert!(matches!(err, RendexError::SingularTransformation(_)));
}

#[test]
fn insert_before_sibling() {
    let mut store = tree();
    store.insert("g", Some("c"), &shape("x")).unwrap();
    assert_eq!(store.entry("g").unwrap().children, vec!["b", "x", "c"]);
    store.insert("g", None, &shape("y")).unwrap();
    assert_eq!(store.entry("g").unwrap().children, vec!["b", "x", "c", "y"]);
}

#[test]
fn failed_insert_leaves_store_untouched() {
    let mut store = tree();
    let bad = LayerSpec::group(Layer::group("h"), vec![shape("new"), shape("b")]);
    assert!(matches!(
        store.insert("root", None, &bad),
        Err(RendexError::DuplicateLayerId(_))
    ));
    assert!(!store.contains("h"));
    assert!(!store.contains("new"));

    assert!(matches!(
        store.insert("a", None, &shape("z")),
        Err(RendexError::WrongLayerType(_))
    ));
    assert!(matches!(
        store.insert("g", Some("nope"), &shape("z")),
        Err(RendexError::LayerNotFound(_))
    ));
    assert!(!store.contains("z"));
}

#[test]
fn remove_drops_subtree() {
    let mut store = tree();
    let removed = store.remove("g").unwrap();
    assert_eq!(removed, vec!["g", "b", "c"]);
    assert_eq!(store.entry("root").unwrap().children, vec!["a"]);
    assert!(!store.contains("b"));
    assert!(store.remove("root").is_err());
    assert!(matches!(
        store.remove("g"),
        Err(RendexError::LayerNotFound(_))
    ));
}

#[test]
fn mask_groups_keep_their_mask() {
    let mut group = Layer::new("mg", LayerKind::MaskGroup);
    group.mask_basis = Some(crate::document::model::MaskBasis::Body);
    let spec = LayerSpec {
        layer: group,
        children: vec![shape("content")],
        mask: Some(Box::new(shape("m"))),
    };
    let mut store = LayerStore::from_spec(&spec).unwrap();
    assert_eq!(store.entry("mg").unwrap().mask.as_deref(), Some("m"));
    assert_eq!(store.subtree("mg").unwrap(), vec!["mg", "m", "content"]);
    assert_eq!(store.to_spec("mg").unwrap(), spec);

    store.remove("m").unwrap();
    assert_eq!(store.entry("mg").unwrap().mask, None);
}

#[test]
fn to_spec_round_trips() {
    let spec = LayerSpec::group(
        Layer::group("root"),
        vec![
            shape("a"),
            LayerSpec::group(Layer::group("g"), vec![shape("b"), shape("c")]),
        ],
    );
    let store = LayerStore::from_spec(&spec).unwrap();
    assert_eq!(store.to_spec("root").unwrap(), spec);
}
