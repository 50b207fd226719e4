//! Backend-free figure geometry: lines, filled regions and guides in data
//! coordinates, ready for [`super::render`].

use crate::error::{Error, Result};
use crate::polyhedra::{IoContract, QUANTIZATION_TOLERANCE, Term, Var};
use crate::sensor::{Margins, SensorParams};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Limits {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<Self> {
        let ok = [x_min, x_max, y_min, y_max].iter().all(|v| v.is_finite())
            && x_min < x_max
            && y_min < y_max;
        if !ok {
            return Err(Error::InvalidInput(format!(
                "bad plot limits x [{x_min}, {x_max}] y [{y_min}, {y_max}]"
            )));
        }
        Ok(Self {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    /// A decade either side of the sensor's interesting range.
    pub fn around(params: &SensorParams) -> Result<Self> {
        let m = Margins::of(params);
        let x_min = if params.start > 0.0 {
            params.start / 10.0
        } else {
            params.k / 1000.0
        };
        let x_max = params
            .saturation
            .map_or(params.k, |sat| sat.final_k.max(params.k))
            * 10.0;
        let y_floor = if m.leak_lo > 0.0 {
            m.leak_lo
        } else {
            m.ymax_lo.max(1e-6) * 1e-3
        };
        let y_top = params
            .saturation
            .map_or(m.ymax_hi, |sat| (sat.ymax_sat * (1.0 + params.std)).max(m.ymax_hi));
        Self::new(x_min, x_max, y_floor / 2.0, y_top * 2.0)
    }

    pub fn union(&self, other: &Limits) -> Limits {
        Limits {
            x_min: self.x_min.min(other.x_min),
            x_max: self.x_max.max(other.x_max),
            y_min: self.y_min.min(other.y_min),
            y_max: self.y_max.max(other.y_max),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.x_min > 0.0 && self.y_min > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shade {
    Off,
    Linear,
    Saturation,
    Contract,
    Nominal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub shade: Shade,
    pub points: Vec<(f64, f64)>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub shade: Shade,
    pub vertices: Vec<(f64, f64)>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub limits: Limits,
    pub log_axes: bool,
    pub segments: Vec<Segment>,
    pub regions: Vec<Region>,
    /// x positions of dotted vertical guides.
    pub guides: Vec<f64>,
}

impl Figure {
    fn new(title: String, x_label: String, limits: Limits, log_axes: bool) -> Self {
        Self {
            title,
            x_label,
            y_label: "output (RPU)".to_string(),
            limits,
            log_axes,
            segments: Vec::new(),
            regions: Vec::new(),
            guides: Vec::new(),
        }
    }
}

/// Nominal response: OFF level up to `start`, linear ramp to `K`, flat ymax.
pub fn envelope_lines(params: &SensorParams, limits: Limits) -> Figure {
    let (start, k) = (params.start, params.k);
    let mut fig = Figure::new(
        format!("{} sensor", params.name),
        format!("{} (µM)", params.name),
        limits,
        true,
    );
    let segment = |points: Vec<(f64, f64)>, label: &str| Segment {
        shade: Shade::Nominal,
        points,
        label: Some(label.to_string()),
    };
    fig.segments.push(segment(
        vec![(limits.x_min, params.leak), (start, params.leak)],
        "OFF",
    ));
    fig.segments.push(segment(
        vec![(start, params.leak), (k, params.ymax_lin)],
        "linear",
    ));
    fig.segments.push(segment(
        vec![(k, params.ymax_lin), (limits.x_max, params.ymax_lin)],
        "saturation",
    ));
    fig.guides = vec![start, k];
    fig
}

/// Filled ±std bands of the three regimes.
pub fn envelope_regions(params: &SensorParams, limits: Limits) -> Figure {
    let m = Margins::of(params);
    let (start, k) = (params.start, params.k);
    let mut fig = Figure::new(
        format!("{} sensor range", params.name),
        format!("{} (µM)", params.name),
        limits,
        true,
    );
    fig.regions.push(Region {
        shade: Shade::Off,
        vertices: rectangle(limits.x_min, start, m.leak_lo, m.leak_hi),
        label: Some("OFF".to_string()),
    });
    fig.regions.push(Region {
        shade: Shade::Linear,
        vertices: vec![
            (start, m.leak_hi),
            (k, m.ymax_hi),
            (k, m.ymax_lo),
            (start, m.leak_lo),
        ],
        label: Some("Linear".to_string()),
    });
    fig.regions.push(Region {
        shade: Shade::Saturation,
        vertices: rectangle(k, limits.x_max, m.ymax_lo, m.ymax_hi),
        label: Some("Saturation".to_string()),
    });
    fig.guides = vec![start, k];
    fig
}

fn rectangle(x0: f64, x1: f64, y0: f64, y1: f64) -> Vec<(f64, f64)> {
    vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
}

/// The part of the limits box satisfying the contract's assumptions and
/// guarantees, as a convex polygon in `(x, y)`.
pub fn contract_polygon(
    contract: &IoContract,
    x: &Var,
    y: &Var,
    limits: Limits,
) -> Result<Vec<(f64, f64)>> {
    let terms = contract.assumptions().conjoin(contract.guarantees());
    if let Some(other) = terms.vars().into_iter().find(|v| v != x && v != y) {
        return Err(Error::InvalidInput(format!(
            "contract mentions `{other}` besides `{x}` and `{y}`"
        )));
    }
    let mut polygon = rectangle(limits.x_min, limits.x_max, limits.y_min, limits.y_max);
    for term in terms.iter() {
        polygon = clip(&polygon, term, x, y);
        if polygon.is_empty() {
            break;
        }
    }
    Ok(polygon)
}

pub fn contract_figure(
    contract: &IoContract,
    x: &Var,
    y: &Var,
    limits: Limits,
    title: &str,
) -> Result<Figure> {
    let mut fig = Figure::new(title.to_string(), x.to_string(), limits, false);
    fig.y_label = y.to_string();
    let cleaned = contract.remove_quantization_errors(QUANTIZATION_TOLERANCE);
    let vertices = contract_polygon(&cleaned, x, y, limits)?;
    if !vertices.is_empty() {
        fig.regions.push(Region {
            shade: Shade::Contract,
            vertices,
            label: Some(title.to_string()),
        });
    }
    Ok(fig)
}

// Sutherland-Hodgman against a*x + b*y <= c.
fn clip(polygon: &[(f64, f64)], term: &Term, x: &Var, y: &Var) -> Vec<(f64, f64)> {
    let (a, b, c) = (term.coefficient(x), term.coefficient(y), term.constant());
    let slack = |p: (f64, f64)| c - (a * p.0 + b * p.1);
    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, &current) in polygon.iter().enumerate() {
        let previous = polygon[(i + polygon.len() - 1) % polygon.len()];
        let (s_cur, s_prev) = (slack(current), slack(previous));
        if (s_cur >= 0.0) != (s_prev >= 0.0) {
            let t = s_prev / (s_prev - s_cur);
            out.push((
                previous.0 + t * (current.0 - previous.0),
                previous.1 + t * (current.1 - previous.1),
            ));
        }
        if s_cur >= 0.0 {
            out.push(current);
        }
    }
    out
}

/// Overlay figures: union of limits, shapes in order, labels of the first.
pub fn stitch(figures: &[Figure]) -> Result<Figure> {
    let Some((first, rest)) = figures.split_first() else {
        return Err(Error::InvalidInput("nothing to stitch".to_string()));
    };
    let mut out = first.clone();
    for fig in rest {
        out.limits = out.limits.union(&fig.limits);
        out.log_axes &= fig.log_axes;
        out.segments.extend(fig.segments.iter().cloned());
        out.regions.extend(fig.regions.iter().cloned());
        out.guides.extend(fig.guides.iter().copied());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{EnvelopeVariant, sensor_contracts};

    fn params() -> SensorParams {
        SensorParams::new("IPTG", 0.002, 5.0, 110.0, 1.2, 0.5)
    }

    fn area(poly: &[(f64, f64)]) -> f64 {
        let n = poly.len();
        (0..n)
            .map(|i| {
                let (a, b) = (poly[i], poly[(i + 1) % n]);
                a.0 * b.1 - b.0 * a.1
            })
            .sum::<f64>()
            .abs()
            / 2.0
    }

    #[test]
    fn limits_reject_inverted_ranges() {
        assert!(Limits::new(1.0, 0.5, 0.0, 1.0).is_err());
        assert!(Limits::new(0.0, 1.0, f64::NAN, 1.0).is_err());
        let l = Limits::around(&params()).unwrap();
        assert!(l.is_positive());
        assert!(l.x_min < 5.0 && l.x_max > 110.0);
        assert!(l.y_min < 0.001 && l.y_max > 1.8);
    }

    #[test]
    fn envelope_lines_meet_at_start_and_k() {
        let p = params();
        let fig = envelope_lines(&p, Limits::around(&p).unwrap());
        assert_eq!(fig.segments.len(), 3);
        assert_eq!(fig.segments[0].points[1], fig.segments[1].points[0]);
        assert_eq!(fig.segments[1].points[1], (110.0, 1.2));
        assert_eq!(fig.guides, vec![5.0, 110.0]);
    }

    #[test]
    fn range_regions_span_margins() {
        let p = params();
        let fig = envelope_regions(&p, Limits::around(&p).unwrap());
        let shades: Vec<_> = fig.regions.iter().map(|r| r.shade).collect();
        assert_eq!(shades, vec![Shade::Off, Shade::Linear, Shade::Saturation]);
        let sat = &fig.regions[2].vertices;
        assert!((sat[0].1 - 0.6).abs() < 1e-12);
        assert!((sat[2].1 - 1.8).abs() < 1e-12);
    }

    #[test]
    fn clipping_by_contract_half_planes() {
        let c = IoContract::from_strings(&["u"], &["y"], &["u <= 2"], &["y >= 1", "y <= u + 1"])
            .unwrap();
        let limits = Limits::new(0.0, 4.0, 0.0, 4.0).unwrap();
        let poly = contract_polygon(&c, &Var::new("u"), &Var::new("y"), limits).unwrap();
        // triangle (0,1) (2,1) (2,3)
        assert!((area(&poly) - 2.0).abs() < 1e-9, "area {}", area(&poly));
        for &(u, y) in &poly {
            assert!(u <= 2.0 + 1e-9 && y >= 1.0 - 1e-9 && y <= u + 1.0 + 1e-9);
        }
    }

    #[test]
    fn empty_and_foreign_contracts() {
        let limits = Limits::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let c = IoContract::from_strings(&["u"], &["y"], &["u >= 5"], &["y >= 0"]).unwrap();
        let poly = contract_polygon(&c, &Var::new("u"), &Var::new("y"), limits).unwrap();
        assert!(poly.is_empty());
        assert!(contract_polygon(&c, &Var::new("u"), &Var::new("z"), limits).is_err());
    }

    #[test]
    fn contract_figure_ignores_projection_residue() {
        use crate::polyhedra::TermList;

        let (u, y) = (Var::new("u"), Var::new("y"));
        // 1e-7 u - 1e-7 y <= -1 alone would push y above the box
        let c = IoContract::new(
            vec![u.clone()],
            vec![y.clone()],
            TermList::new(),
            TermList::from_terms([
                Term::new([(u.clone(), 1e-7), (y.clone(), -1e-7)], -1.0),
                Term::lower("y", 1.0),
            ]),
        )
        .unwrap();
        let limits = Limits::new(0.0, 2.0, 0.0, 2.0).unwrap();
        assert!(contract_polygon(&c, &u, &y, limits).unwrap().is_empty());

        let fig = contract_figure(&c, &u, &y, limits, "residue").unwrap();
        assert_eq!(fig.regions.len(), 1);
        assert!((area(&fig.regions[0].vertices) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sensor_regimes_tile_the_envelope() {
        let p = params();
        let limits = Limits::new(0.5, 500.0, 0.0, 2.0).unwrap();
        let contracts = sensor_contracts(&p, "IPTG", "x", EnvelopeVariant::Simple).unwrap();
        let (u, x) = (Var::new("IPTG"), Var::new("x"));
        let figs: Vec<Figure> = contracts
            .iter()
            .map(|(regime, c)| contract_figure(c, &u, &x, limits, regime.name()).unwrap())
            .collect();
        assert!(figs.iter().all(|f| f.regions.len() == 1));
        let all = stitch(&figs).unwrap();
        assert_eq!(all.regions.len(), 3);
        assert_eq!(all.title, "lag");
        assert!(stitch(&[]).is_err());
    }

    #[test]
    fn stitch_takes_union_of_limits() {
        let p = params();
        let a = envelope_lines(&p, Limits::new(1.0, 10.0, 0.1, 1.0).unwrap());
        let b = envelope_regions(&p, Limits::new(0.5, 5.0, 0.2, 3.0).unwrap());
        let s = stitch(&[a, b]).unwrap();
        assert_eq!(s.limits, Limits::new(0.5, 10.0, 0.1, 3.0).unwrap());
        assert_eq!(s.x_label, "IPTG (µM)");
        assert_eq!(s.segments.len(), 3);
        assert_eq!(s.regions.len(), 3);
        assert_eq!(s.guides.len(), 4);
    }
}
