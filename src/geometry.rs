// Copyright 2026 The Sobek-Import Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Branch geometry reconciliation.
//!
//! Curve-point records refine the straight line between a branch's
//! begin and end node into a polyline.  Channel files store curve
//! points as `(chainage, angle°)` pairs walked from the start node;
//! sewer files store absolute `(x, y)` pairs.  Redundant collinear
//! midpoints are eliminated, and the realized length is checked against
//! the declared branch length.

use std::collections::HashMap;

use crate::common::Diagnostics;
use crate::records::network::{BranchGeometryRecord, BranchRecord, NodeRecord};

/// Chainage deltas and point distances below this are degenerate.
const EPSILON: f64 = 1e-6;

pub type Point = (f64, f64);

/// Realizes one branch polyline.  With no curve points the result is
/// the two-point straight line between the nodes.
pub fn calculate_geometry(
    is_channel: bool,
    curve_points: &[Point],
    start: Point,
    end: Point,
) -> Vec<Point> {
    let mut points = Vec::with_capacity(curve_points.len() + 2);
    points.push(start);

    if is_channel {
        // (chainage, angle°) pairs: walk each chainage delta along the
        // angle's direction.  Near-zero deltas would only perturb the
        // total length and are dropped.
        let mut sorted: Vec<Point> = curve_points.to_vec();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut position = start;
        let mut previous_chainage = 0.0;
        for &(chainage, angle) in &sorted {
            let delta = chainage - previous_chainage;
            if delta <= EPSILON {
                continue;
            }
            let radians = angle.to_radians();
            position = (
                position.0 + delta * radians.cos(),
                position.1 + delta * radians.sin(),
            );
            points.push(position);
            previous_chainage = chainage;
        }
    } else {
        points.extend_from_slice(curve_points);
    }

    points.push(end);
    dedup_points(&mut points);
    eliminate_collinear(&mut points);
    points
}

/// Sum of the segment lengths.
pub fn polyline_length(points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| distance(w[0], w[1]))
        .sum()
}

/// Realizes every branch polyline and checks each against its declared
/// length.  Branches whose begin or end node is missing are skipped
/// with a warning.
pub fn reconcile(
    branches: &[BranchRecord],
    geometries: &[BranchGeometryRecord],
    nodes: &[NodeRecord],
    is_channel: bool,
    diag: &mut Diagnostics,
) -> HashMap<String, Vec<Point>> {
    let node_table: HashMap<&str, Point> =
        nodes.iter().map(|n| (n.id.as_str(), (n.x, n.y))).collect();
    let geometry_table: HashMap<&str, &BranchGeometryRecord> = geometries
        .iter()
        .map(|g| (g.branch_id.as_str(), g))
        .collect();

    let mut out = HashMap::new();
    for branch in branches {
        let (start, end) = match (
            node_table.get(branch.begin_node.as_str()),
            node_table.get(branch.end_node.as_str()),
        ) {
            (Some(&start), Some(&end)) => (start, end),
            _ => {
                diag.warn(format!(
                    "branch {} references an unknown begin or end node; geometry skipped",
                    branch.id
                ));
                continue;
            }
        };
        let curve_points = geometry_table
            .get(branch.id.as_str())
            .map(|g| g.curve_points.as_slice())
            .unwrap_or(&[]);
        let points = calculate_geometry(is_channel, curve_points, start, end);
        check_length(branch, &points, diag);
        out.insert(branch.id.clone(), points);
    }
    out
}

/// Warns when the realized length disagrees with the declared branch
/// length by more than 0.01 percent.
fn check_length(branch: &BranchRecord, points: &[Point], diag: &mut Diagnostics) {
    if branch.length <= 0.0 {
        return;
    }
    let realized = polyline_length(points);
    let difference = (branch.length - realized).abs();
    if difference < EPSILON {
        return;
    }
    let percentage = if realized > 0.0 {
        100.0 * difference / realized
    } else {
        100.0
    };
    if percentage < 0.01 {
        return;
    }
    diag.warn(format!(
        "branch {} - {} has been imported with a difference of {} between \
         length {} and geometry length {}",
        branch.id, branch.name, difference, branch.length, realized
    ));
}

fn distance(a: Point, b: Point) -> f64 {
    ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt()
}

fn dedup_points(points: &mut Vec<Point>) {
    points.dedup_by(|b, a| distance(*a, *b) < EPSILON);
}

/// Removes interior points that lie on the segment between their
/// neighbors, within epsilon.  The straight-branch midpoint curve point
/// is the common case.
fn eliminate_collinear(points: &mut Vec<Point>) {
    let mut i = 1;
    while i + 1 < points.len() {
        if is_collinear(points[i - 1], points[i], points[i + 1]) {
            points.remove(i);
        } else {
            i += 1;
        }
    }
}

fn is_collinear(a: Point, p: Point, b: Point) -> bool {
    let cross = (p.0 - a.0) * (b.1 - a.1) - (p.1 - a.1) * (b.0 - a.0);
    let span = distance(a, b);
    if span < EPSILON {
        return true;
    }
    // perpendicular distance of p from the a-b line
    (cross / span).abs() < EPSILON
        && distance(a, p) + distance(p, b) <= span + EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::network;

    #[test]
    fn test_no_curve_points_is_straight_line() {
        let points = calculate_geometry(true, &[], (0.0, 0.0), (100.0, 0.0));
        assert_eq!(vec![(0.0, 0.0), (100.0, 0.0)], points);
        assert!((polyline_length(&points) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_straight_midpoint_curve_point_eliminated() {
        // chainage 50 at angle 0 lands exactly on the midpoint
        let points = calculate_geometry(true, &[(50.0, 0.0)], (0.0, 0.0), (100.0, 0.0));
        assert_eq!(vec![(0.0, 0.0), (100.0, 0.0)], points);
    }

    #[test]
    fn test_channel_walk_bends_the_line() {
        let points =
            calculate_geometry(true, &[(50.0, 90.0)], (0.0, 0.0), (100.0, 0.0));
        assert_eq!(3, points.len());
        assert!((points[1].0 - 0.0).abs() < 1e-9);
        assert!((points[1].1 - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_near_zero_chainage_guard() {
        let points = calculate_geometry(
            true,
            &[(1e-9, 45.0), (50.0, 0.0)],
            (0.0, 0.0),
            (100.0, 0.0),
        );
        // the degenerate first point is dropped, the straight midpoint
        // is eliminated, the length stays exact
        assert_eq!(vec![(0.0, 0.0), (100.0, 0.0)], points);
        assert!((polyline_length(&points) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_absolute_points_kept_in_order() {
        let points = calculate_geometry(
            false,
            &[(20.0, 10.0), (60.0, -10.0)],
            (0.0, 0.0),
            (100.0, 0.0),
        );
        assert_eq!(
            vec![(0.0, 0.0), (20.0, 10.0), (60.0, -10.0), (100.0, 0.0)],
            points
        );
    }

    #[test]
    fn test_reconcile_checks_declared_length() {
        let mut diag = Diagnostics::new();
        let nodes = network::read_nodes(
            "NODE id 'n1' px 0 py 0 node\nNODE id 'n2' px 100 py 0 node\n",
            &mut diag,
        );
        let branches = network::read_branches(
            "BRCH id '1' nm 'ok' bn 'n1' en 'n2' al 100 brch\n\
             BRCH id '2' nm 'short' bn 'n1' en 'n2' al 250 brch\n\
             BRCH id '3' nm 'dangling' bn 'n1' en 'missing' al 10 brch\n",
            &mut diag,
        );
        let geometries = network::read_branch_geometry("", &mut diag);
        assert!(diag.is_empty());

        let polylines = reconcile(&branches, &geometries, &nodes, true, &mut diag);
        assert_eq!(2, polylines.len());
        assert_eq!(2, polylines["1"].len());
        let messages: Vec<&str> = diag.iter().map(|d| d.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("branch 2 - short")));
        assert!(messages
            .iter()
            .any(|m| m.contains("branch 3 references an unknown begin or end node")));
    }
}
