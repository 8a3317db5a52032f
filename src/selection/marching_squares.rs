//! Marching Squares isoline extraction on a sampled scalar field.
//!
//! The field is sampled on a regular integer lattice: value `[i, j]` sits at
//! `(origin.0 + i, origin.1 + j)`. A lattice node is inside the isoline when
//! its value is strictly greater than the level. Crossing points are linearly
//! interpolated along lattice edges and joined into polylines through the
//! edges they share, so neighbouring cells always agree on a vertex.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::ArrayView2;
use tracing::debug;

use crate::error::{GateError, Result};

/// A 2D point in lattice coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One connected piece of an isoline.
#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    /// Vertices in tracing order. Closed contours do not repeat the first one.
    pub points: Vec<Point>,
    pub is_closed: bool,
}

impl Contour {
    pub fn new(points: Vec<Point>, is_closed: bool) -> Self {
        Self { points, is_closed }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Vertices with the first one repeated at the end for closed contours.
    pub fn closed_vertices(&self) -> Vec<Point> {
        let mut vertices = self.points.clone();
        if self.is_closed {
            if let Some(&first) = self.points.first() {
                vertices.push(first);
            }
        }
        vertices
    }
}

/// A lattice edge, identified by its lower-left node.
///
/// `X(i, j)` joins `(i, j)` and `(i + 1, j)`; `Y(i, j)` joins `(i, j)` and
/// `(i, j + 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Edge {
    X(usize, usize),
    Y(usize, usize),
}

/// Oriented edge-to-edge links produced by the cell pass.
struct SegmentGraph {
    next: BTreeMap<Edge, Edge>,
    incoming: BTreeSet<Edge>,
}

impl SegmentGraph {
    fn new() -> Self {
        Self {
            next: BTreeMap::new(),
            incoming: BTreeSet::new(),
        }
    }

    fn link(&mut self, from: Edge, to: Edge) -> Result<()> {
        if self.next.insert(from, to).is_some() {
            return Err(GateError::ContourExtractionError(format!(
                "lattice edge {:?} leaves more than one segment",
                from
            )));
        }
        if !self.incoming.insert(to) {
            return Err(GateError::ContourExtractionError(format!(
                "lattice edge {:?} receives more than one segment",
                to
            )));
        }
        Ok(())
    }
}

/// Trace the isoline of `field` at `level`.
///
/// # Arguments
/// * `field` - Scalar values indexed as `[x, y]`
/// * `origin` - Lattice coordinates of `field[[0, 0]]`
/// * `level` - Isoline value
///
/// # Returns
/// Open polylines (ending on the lattice border) followed by closed loops.
/// Pieces whose vertices all coincide are discarded. Orientation keeps the
/// region above `level` on the left.
pub fn trace_isoline(field: ArrayView2<f64>, origin: (f64, f64), level: f64) -> Result<Vec<Contour>> {
    if !level.is_finite() {
        return Err(GateError::ContourExtractionError(format!(
            "contour level {} is not finite",
            level
        )));
    }
    if field.iter().any(|v| !v.is_finite()) {
        return Err(GateError::ContourExtractionError(
            "field contains non-finite values".to_string(),
        ));
    }

    let (nx, ny) = field.dim();
    if nx < 2 || ny < 2 {
        return Ok(Vec::new());
    }

    let graph = march(&field, level)?;
    let contours = link_segments(graph, &field, origin, level)?;

    debug!(level, contours = contours.len(), "traced isoline");
    Ok(contours)
}

/// Run the cell pass, producing oriented segments between crossed edges.
fn march(field: &ArrayView2<f64>, level: f64) -> Result<SegmentGraph> {
    let (nx, ny) = field.dim();
    let mut graph = SegmentGraph::new();

    for i in 0..nx - 1 {
        for j in 0..ny - 1 {
            // Corners counter-clockwise from the lower-left node
            let values = [
                field[[i, j]],
                field[[i + 1, j]],
                field[[i + 1, j + 1]],
                field[[i, j + 1]],
            ];
            let inside = values.map(|v| v > level);

            let case = inside
                .iter()
                .enumerate()
                .fold(0u8, |acc, (k, &b)| acc | ((b as u8) << k));
            if case == 0 || case == 15 {
                continue;
            }

            // Side k runs from corner k to corner k + 1
            let sides = [
                Edge::X(i, j),
                Edge::Y(i + 1, j),
                Edge::X(i, j + 1),
                Edge::Y(i, j),
            ];

            // Walking the cell border counter-clockwise, a side either leaves
            // the inside region or enters it
            let mut leaving = Vec::with_capacity(2);
            let mut entering = Vec::with_capacity(2);
            for k in 0..4 {
                match (inside[k], inside[(k + 1) % 4]) {
                    (true, false) => leaving.push(k),
                    (false, true) => entering.push(k),
                    _ => {}
                }
            }

            match (leaving.as_slice(), entering.as_slice()) {
                (&[l], &[e]) => graph.link(sides[l], sides[e])?,
                (&[l1, l2], &[_, _]) => {
                    // Saddle: the centre decides whether the two inside
                    // corners are connected
                    let centre = values.iter().sum::<f64>() / 4.0;
                    let step = if centre > level { 1 } else { 3 };
                    graph.link(sides[l1], sides[(l1 + step) % 4])?;
                    graph.link(sides[l2], sides[(l2 + step) % 4])?;
                }
                _ => {
                    return Err(GateError::ContourExtractionError(format!(
                        "unrecognized cell case {} at ({}, {})",
                        case, i, j
                    )))
                }
            }
        }
    }

    Ok(graph)
}

/// Interpolated crossing point of the isoline on `edge`.
fn crossing_point(field: &ArrayView2<f64>, origin: (f64, f64), level: f64, edge: Edge) -> Point {
    let ((i0, j0), (i1, j1)) = match edge {
        Edge::X(i, j) => ((i, j), (i + 1, j)),
        Edge::Y(i, j) => ((i, j), (i, j + 1)),
    };
    let v0 = field[[i0, j0]];
    let v1 = field[[i1, j1]];

    // A crossed edge always has one node on each side of the level
    let t = if v1 == v0 {
        0.5
    } else {
        ((level - v0) / (v1 - v0)).clamp(0.0, 1.0)
    };

    let x0 = origin.0 + i0 as f64;
    let y0 = origin.1 + j0 as f64;
    Point::new(
        x0 + t * (i1 - i0) as f64,
        y0 + t * (j1 - j0) as f64,
    )
}

/// Follow the oriented links into polylines.
fn link_segments(
    mut graph: SegmentGraph,
    field: &ArrayView2<f64>,
    origin: (f64, f64),
    level: f64,
) -> Result<Vec<Contour>> {
    let mut contours = Vec::new();
    let to_points = |edges: &[Edge]| -> Vec<Point> {
        edges
            .iter()
            .map(|&e| crossing_point(field, origin, level, e))
            .collect()
    };

    // Open chains start on an edge nothing flows into
    let starts: Vec<Edge> = graph
        .next
        .keys()
        .copied()
        .filter(|e| !graph.incoming.contains(e))
        .collect();

    for start in starts {
        let mut chain = vec![start];
        let mut current = start;
        while let Some(next) = graph.next.remove(&current) {
            chain.push(next);
            current = next;
        }
        push_piece(&mut contours, to_points(&chain), false);
    }

    // Everything left belongs to closed loops
    loop {
        let Some(start) = graph.next.keys().next().copied() else {
            break;
        };
        let mut chain = vec![start];
        let mut current = start;
        loop {
            let Some(next) = graph.next.remove(&current) else {
                return Err(GateError::ContourExtractionError(format!(
                    "isoline through {:?} does not close",
                    start
                )));
            };
            if next == start {
                break;
            }
            chain.push(next);
            current = next;
        }
        push_piece(&mut contours, to_points(&chain), true);
    }

    Ok(contours)
}

/// Keep a linked piece unless it collapses to a single point.
///
/// Two-vertex open pieces are real: they cut off a lattice corner node.
fn push_piece(contours: &mut Vec<Contour>, points: Vec<Point>, is_closed: bool) {
    let Some(&first) = points.first() else {
        return;
    };
    if points.iter().all(|p| *p == first) {
        return;
    }
    contours.push(Contour::new(points, is_closed));
}

/// Flatten contours to a flat f64 array for FFI.
///
/// Format: [num_contours,
///          is_closed_1, num_points_1, x1, y1, x2, y2, ...,
///          is_closed_2, num_points_2, ...]
pub fn contours_to_flat(contours: &[Contour]) -> Vec<f64> {
    let mut result = Vec::new();
    result.push(contours.len() as f64);

    for contour in contours {
        result.push(if contour.is_closed { 1.0 } else { 0.0 });
        result.push(contour.points.len() as f64);

        for point in &contour.points {
            result.push(point.x);
            result.push(point.y);
        }
    }

    result
}
