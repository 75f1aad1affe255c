use deepnest_engine::cache::NfpCache;
use deepnest_engine::clipping::{ClipEngine, ClipperEngine, FillRule};
use deepnest_engine::geometry::{self, Point, CLIPPER_SCALE};
use deepnest_engine::nfp::{inner_nfp, outer_nfp};
use deepnest_engine::part::Polygon;

fn square(side: f64, source: u32) -> Polygon {
    Polygon::new(vec![Point::new(0.0, 0.0), Point::new(side, 0.0), Point::new(side, side), Point::new(0.0, side)], source)
}

fn l_shape(source: u32) -> Polygon {
    Polygon::new(
        vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 2.0),
            Point::new(0.0, 2.0),
        ],
        source,
    )
}

#[test]
fn outer_nfp_of_concave_l_shape_keeps_square_outside() {
    let cache = NfpCache::new();
    let clip = ClipperEngine::default();
    let a = l_shape(1);
    let b = square(1.0, 2);

    let nfp = outer_nfp(&cache, &clip, CLIPPER_SCALE, &a, &b, false).expect("outer nfp for concave A");
    assert!(!nfp.is_empty());

    for v in nfp.all_points() {
        let shift_x = v.x - b.points[0].x;
        let shift_y = v.y - b.points[0].y;
        let shifted = geometry::translate_polygon(&b.points, shift_x, shift_y);
        let overlap_rings = clip.intersection(&[a.points.clone()], &[shifted], FillRule::NonZero);
        let overlap_area: f64 = overlap_rings.iter().map(|r| geometry::polygon_area(r).abs()).sum();
        assert!(overlap_area < 1e-3, "square at {:?} overlaps the L-shape by {overlap_area}", (v.x, v.y));
    }
}

#[test]
fn inner_nfp_of_concave_container_keeps_part_inside() {
    let cache = NfpCache::new();
    let clip = ClipperEngine::default();
    let container = Polygon::new(
        vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 3.0),
            Point::new(0.0, 3.0),
        ],
        1,
    );
    let part = square(0.5, 2);

    let nfp = inner_nfp(&cache, &clip, CLIPPER_SCALE, &container, &part).expect("inner nfp for concave container");
    assert!(!nfp.is_empty());

    for v in nfp.all_points() {
        let shift_x = v.x - part.points[0].x;
        let shift_y = v.y - part.points[0].y;
        let shifted = geometry::translate_polygon(&part.points, shift_x, shift_y);
        for p in &shifted {
            assert!(geometry::point_in_polygon(&container.points, p.x, p.y), "corner {:?} escaped the concave container", (p.x, p.y));
        }
    }
}

#[test]
fn inner_nfp_rectangle_matches_expected_reachable_area() {
    let cache = NfpCache::new();
    let clip = ClipperEngine::default();
    let container = square(10.0, 1);
    let part = square(2.0, 2);

    let nfp = inner_nfp(&cache, &clip, CLIPPER_SCALE, &container, &part).expect("inner nfp");
    // the reference vertex may range over an 8x8 square (10 - 2 on each axis)
    let area: f64 = nfp.shapes().iter().map(|s| geometry::polygon_area(&s.points).abs()).sum();
    assert!((area - 64.0).abs() < 1e-3, "expected reachable area 64, got {area}");
}
