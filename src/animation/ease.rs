/// Keyframe easing curve given by its inner control values.
///
/// The curve is the one-dimensional Bezier through `[0, controls..., 1]`; an empty control list
/// is linear.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Easing(pub Vec<f64>);

impl Easing {
    pub fn linear() -> Self {
        Self(Vec::new())
    }

    /// Evaluate at normalized progress `t` by repeated linear interpolation of control points.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        if self.0.is_empty() {
            return t;
        }
        let mut p = Vec::with_capacity(self.0.len() + 2);
        p.push(0.0);
        p.extend_from_slice(&self.0);
        p.push(1.0);
        while p.len() > 1 {
            for i in 0..p.len() - 1 {
                p[i] = (1.0 - t) * p[i] + t * p[i + 1];
            }
            p.pop();
        }
        p[0]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/ease.rs"]
mod tests;
