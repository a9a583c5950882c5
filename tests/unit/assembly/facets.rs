use super::*;
use crate::expr::node::NodeId;

#[test]
fn embedded_mask_bases_share_facets() {
    assert_eq!(Facet::from(MaskBasis::BodyEmbed), Facet::Body);
    assert_eq!(Facet::from(MaskBasis::FillEmbed), Facet::Fill);
    assert_eq!(Facet::from(MaskBasis::Solid).index(), 0);
    assert_eq!(Facet::from(EffectBasis::Background).index(), 5);
}

#[test]
fn request_is_idempotent_and_unset_reads_null() {
    let mut f = Facets::new();
    f.request(EffectBasis::Fill);
    f.request(EffectBasis::Fill);
    assert!(f.is_requested(Facet::Fill));
    assert!(!f.is_requested(Facet::Body));
    assert_eq!(f.get(Facet::Fill), None);
    assert!(!f.finished());

    f.set(Facet::Fill, Some(NodeId(3)));
    assert_eq!(f.get(EffectBasis::Fill), Some(NodeId(3)));
    assert!(f.finished());
}

#[test]
fn solid_and_background_requests_never_block_finished() {
    let mut f = Facets::new();
    f.request(MaskBasis::Solid);
    f.request(EffectBasis::Background);
    assert!(f.finished());
}

#[test]
fn null_render_counts_as_provided() {
    let mut f = Facets::new();
    f.request(EffectBasis::LayerAndEffects);
    assert!(!f.finished());
    f.set(Facet::LayerAndEffects, None);
    assert!(f.finished());
    assert_eq!(f.get(Facet::LayerAndEffects), None);
}
