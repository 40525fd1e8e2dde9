//! 2D coordinate transform models
//!
//! Closed set of the transform classes that appear in stored tile specs:
//! affine, second-order polynomial, and translation. Each model parses its
//! whitespace-delimited parameter string, serializes back to the canonical
//! string, applies to a point, and concatenates where a closed form exists.
//!
//! Class ids on the wire are the canonical class-name strings used by the
//! render web service, so collections written by this client remain
//! readable by every other consumer of the same stacks.

use crate::error::{Error, Result};

/// Wire class id for the affine model
pub const AFFINE_2D: &str = "mpicbg.trakem2.transform.AffineModel2D";
/// Wire class id for the second-order polynomial model
pub const POLYNOMIAL_2D: &str = "mpicbg.trakem2.transform.PolynomialTransform2D";
/// Wire class id for the translation model
pub const TRANSLATION_2D: &str = "mpicbg.trakem2.transform.TranslationModel2D";

/// Affine transform.
///
/// Parameter order is `m00 m10 m01 m11 m02 m12` (column-major matrix
/// followed by the translation column).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineModel {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m11: f64,
    pub m02: f64,
    pub m12: f64,
}

/// Translation transform, parameter order `tx ty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslationModel {
    pub tx: f64,
    pub ty: f64,
}

/// Second-order polynomial transform.
///
/// Twelve parameters: the six x coefficients then the six y coefficients,
/// each in term order `1 x y x^2 xy y^2`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialModel {
    pub coefficients: [f64; 12],
}

/// One concrete transform, tagged by model class.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformModel {
    Affine(AffineModel),
    Polynomial(PolynomialModel),
    Translation(TranslationModel),
}

fn parse_values(class_name: &str, data: &str, expected: usize) -> Result<Vec<f64>> {
    let values: std::result::Result<Vec<f64>, _> =
        data.split_whitespace().map(str::parse::<f64>).collect();
    let values = values.map_err(|e| Error::TransformParse {
        class_name: class_name.to_string(),
        data: data.to_string(),
        reason: e.to_string(),
    })?;
    if values.len() != expected {
        return Err(Error::TransformParse {
            class_name: class_name.to_string(),
            data: data.to_string(),
            reason: format!("expected {} values but found {}", expected, values.len()),
        });
    }
    Ok(values)
}

impl TransformModel {
    /// Initialize a model from its wire class id and parameter string.
    pub fn from_parameters(class_name: &str, data: &str) -> Result<TransformModel> {
        match class_name {
            AFFINE_2D => {
                let v = parse_values(class_name, data, 6)?;
                Ok(TransformModel::Affine(AffineModel {
                    m00: v[0],
                    m10: v[1],
                    m01: v[2],
                    m11: v[3],
                    m02: v[4],
                    m12: v[5],
                }))
            }
            TRANSLATION_2D => {
                let v = parse_values(class_name, data, 2)?;
                Ok(TransformModel::Translation(TranslationModel {
                    tx: v[0],
                    ty: v[1],
                }))
            }
            POLYNOMIAL_2D => {
                let v = parse_values(class_name, data, 12)?;
                let mut coefficients = [0.0; 12];
                coefficients.copy_from_slice(&v);
                Ok(TransformModel::Polynomial(PolynomialModel { coefficients }))
            }
            other => Err(Error::UnknownTransformClass {
                class_name: other.to_string(),
            }),
        }
    }

    /// Wire class id for this model.
    pub fn class_name(&self) -> &'static str {
        match self {
            TransformModel::Affine(_) => AFFINE_2D,
            TransformModel::Polynomial(_) => POLYNOMIAL_2D,
            TransformModel::Translation(_) => TRANSLATION_2D,
        }
    }

    /// Canonical parameter string in the model's native order.
    pub fn to_data_string(&self) -> String {
        match self {
            TransformModel::Affine(a) => format!(
                "{} {} {} {} {} {}",
                a.m00, a.m10, a.m01, a.m11, a.m02, a.m12
            ),
            TransformModel::Translation(t) => format!("{} {}", t.tx, t.ty),
            TransformModel::Polynomial(p) => p
                .coefficients
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Apply the transform to a point.
    pub fn apply(&self, point: [f64; 2]) -> [f64; 2] {
        let [x, y] = point;
        match self {
            TransformModel::Affine(a) => [
                a.m00 * x + a.m01 * y + a.m02,
                a.m10 * x + a.m11 * y + a.m12,
            ],
            TransformModel::Translation(t) => [x + t.tx, y + t.ty],
            TransformModel::Polynomial(p) => {
                let c = &p.coefficients;
                let terms = [1.0, x, y, x * x, x * y, y * y];
                let mut out = [0.0, 0.0];
                for (i, t) in terms.iter().enumerate() {
                    out[0] += c[i] * t;
                    out[1] += c[i + 6] * t;
                }
                out
            }
        }
    }

    /// Concatenate `other` onto this transform.
    ///
    /// The result applies `other` first and then `self`, so collapsing a
    /// chain tail `[.., other, self]` into the returned model preserves
    /// point behavior. Supported pairs are affine/affine,
    /// affine/translation, and translation/translation; anything touching a
    /// polynomial has no closed form here.
    pub fn concatenate(&self, other: &TransformModel) -> Result<TransformModel> {
        match (self, other) {
            (TransformModel::Affine(a), TransformModel::Affine(b)) => {
                Ok(TransformModel::Affine(AffineModel {
                    m00: a.m00 * b.m00 + a.m01 * b.m10,
                    m10: a.m10 * b.m00 + a.m11 * b.m10,
                    m01: a.m00 * b.m01 + a.m01 * b.m11,
                    m11: a.m10 * b.m01 + a.m11 * b.m11,
                    m02: a.m00 * b.m02 + a.m01 * b.m12 + a.m02,
                    m12: a.m10 * b.m02 + a.m11 * b.m12 + a.m12,
                }))
            }
            (TransformModel::Affine(a), TransformModel::Translation(t)) => {
                Ok(TransformModel::Affine(AffineModel {
                    m02: a.m00 * t.tx + a.m01 * t.ty + a.m02,
                    m12: a.m10 * t.tx + a.m11 * t.ty + a.m12,
                    ..*a
                }))
            }
            (TransformModel::Translation(t), TransformModel::Translation(u)) => {
                Ok(TransformModel::Translation(TranslationModel {
                    tx: t.tx + u.tx,
                    ty: t.ty + u.ty,
                }))
            }
            (left, right) => Err(Error::UnsupportedConcatenation {
                left: left.class_name(),
                right: right.class_name(),
            }),
        }
    }
}
