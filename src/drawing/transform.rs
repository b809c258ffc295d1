//! `transform` attribute lists to affine matrices

use glam::{DAffine2, DVec2, dvec2};
use pest::Parser;

use super::grammar::{Rule, SvgAttrParser, SyntaxError, number};

/// Parse a transform list; the rightmost transform applies first.
pub fn parse_transform(src: &str) -> Result<DAffine2, SyntaxError> {
    let mut acc = DAffine2::IDENTITY;
    for top in SvgAttrParser::parse(Rule::transform_list, src)? {
        for transform in top.into_inner() {
            if transform.as_rule() != Rule::transform {
                continue;
            }
            let mut inner = transform.into_inner();
            let name = inner.next().map(|p| p.as_str()).unwrap_or_default();
            let args = inner.map(number).collect::<Result<Vec<_>, _>>()?;
            acc = acc * single(name, &args)?;
        }
    }
    Ok(acc)
}

fn single(name: &str, args: &[f64]) -> Result<DAffine2, SyntaxError> {
    let arity = |expected: &'static str| SyntaxError::TransformArity {
        name: name.to_string(),
        expected,
        count: args.len(),
    };
    Ok(match (name, args) {
        ("matrix", &[a, b, c, d, e, f]) => {
            DAffine2::from_cols(dvec2(a, b), dvec2(c, d), dvec2(e, f))
        }
        ("matrix", _) => return Err(arity("6")),
        ("translate", &[tx]) => DAffine2::from_translation(dvec2(tx, 0.0)),
        ("translate", &[tx, ty]) => DAffine2::from_translation(dvec2(tx, ty)),
        ("translate", _) => return Err(arity("1 or 2")),
        ("scale", &[s]) => DAffine2::from_scale(DVec2::splat(s)),
        ("scale", &[sx, sy]) => DAffine2::from_scale(dvec2(sx, sy)),
        ("scale", _) => return Err(arity("1 or 2")),
        ("rotate", &[deg]) => DAffine2::from_angle(deg.to_radians()),
        ("rotate", &[deg, cx, cy]) => {
            let pivot = dvec2(cx, cy);
            DAffine2::from_translation(pivot)
                * DAffine2::from_angle(deg.to_radians())
                * DAffine2::from_translation(-pivot)
        }
        ("rotate", _) => return Err(arity("1 or 3")),
        ("skewX", &[deg]) => DAffine2::from_cols(
            dvec2(1.0, 0.0),
            dvec2(deg.to_radians().tan(), 1.0),
            DVec2::ZERO,
        ),
        ("skewY", &[deg]) => DAffine2::from_cols(
            dvec2(1.0, deg.to_radians().tan()),
            dvec2(0.0, 1.0),
            DVec2::ZERO,
        ),
        _ => return Err(arity("1")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(src: &str, p: DVec2) -> DVec2 {
        parse_transform(src).unwrap().transform_point2(p)
    }

    #[test]
    fn empty_is_identity() {
        assert_eq!(parse_transform("").unwrap(), DAffine2::IDENTITY);
    }

    #[test]
    fn inkscape_flip_matrix() {
        // Inkscape's PDF import wraps pages in matrix(1.333,0,0,-1.333,0,h)
        let p = apply("matrix(2,0,0,-2,0,100)", dvec2(10.0, 10.0));
        assert_eq!(p, dvec2(20.0, 80.0));
    }

    #[test]
    fn lists_apply_right_to_left() {
        let p = apply("translate(10) scale(2)", dvec2(1.0, 1.0));
        assert_eq!(p, dvec2(12.0, 2.0));
    }

    #[test]
    fn rotate_about_pivot() {
        let p = apply("rotate(90 10 10)", dvec2(20.0, 10.0));
        assert!((p - dvec2(10.0, 20.0)).length() < 1e-9);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        assert!(matches!(
            parse_transform("matrix(1,0,0,1)"),
            Err(SyntaxError::TransformArity { .. })
        ));
    }
}
