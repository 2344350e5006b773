//! Built-in intersection layouts.

use crate::conflict::IntersectionTopology;
use crate::lane::Route;

/// Sides of a four-way intersection, clockwise from north.
const SIDES: [&str; 4] = ["N", "E", "S", "W"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Movement {
    Straight,
    Right,
    Left,
}

/// Classify a movement by entry and exit side index (drive-on-the-right).
///
/// Entering from side `d` the vehicle heads toward `d + 2`; its right hand
/// points at `d - 1` (mod 4). U-turns return `None`.
fn movement(entry: usize, exit: usize) -> Option<Movement> {
    match (exit + 4 - entry) % 4 {
        0 => None,
        1 => Some(Movement::Left),
        2 => Some(Movement::Straight),
        _ => Some(Movement::Right),
    }
}

fn routes_conflict(a: (usize, usize), b: (usize, usize)) -> bool {
    if a.0 == b.0 || a.1 == b.1 {
        return true;
    }
    let (Some(ma), Some(mb)) = (movement(a.0, a.1), movement(b.0, b.1)) else {
        return false;
    };
    let opposing = (a.0 + 2) % 4 == b.0;
    if ma == Movement::Straight && mb == Movement::Straight && opposing {
        return false;
    }
    ma != Movement::Right && mb != Movement::Right
}

/// A two-lane, four-way intersection with entries and exits `N`, `E`, `S`, `W`.
///
/// Routes sharing an entry or an exit always conflict. Any other pair conflicts
/// unless the two are opposing straight-through movements or at least one of
/// them is a right turn.
pub fn two_lane_four_way() -> IntersectionTopology {
    let routes: Vec<(usize, usize)> = (0..4)
        .flat_map(|entry| (0..4).map(move |exit| (entry, exit)))
        .filter(|&(entry, exit)| movement(entry, exit).is_some())
        .collect();

    let mut builder = IntersectionTopology::builder("two-lane-four-way").lanes(SIDES);
    for (i, &a) in routes.iter().enumerate() {
        for &b in &routes[i + 1..] {
            if routes_conflict(a, b) {
                builder = builder.conflict(
                    Route::new(SIDES[a.0], SIDES[a.1]),
                    Route::new(SIDES[b.0], SIDES[b.1]),
                );
            }
        }
    }

    match builder.build() {
        Ok(topology) => topology,
        // Every route above is drawn from SIDES, which are all declared.
        Err(_) => unreachable!("preset declares every lane it uses"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictDetector;

    fn r(entry: &str, exit: &str) -> Route {
        Route::new(entry, exit)
    }

    #[test]
    fn opposing_straights_are_free() {
        let topo = two_lane_four_way();
        assert!(!topo.conflicts(&r("N", "S"), &r("S", "N")));
        assert!(!topo.conflicts(&r("E", "W"), &r("W", "E")));
    }

    #[test]
    fn crossing_straights_conflict() {
        let topo = two_lane_four_way();
        assert!(topo.conflicts(&r("N", "S"), &r("E", "W")));
        assert!(topo.conflicts(&r("W", "E"), &r("S", "N")));
    }

    #[test]
    fn shared_exit_conflicts_even_for_right_turns() {
        let topo = two_lane_four_way();
        // From N the right turn exits W, as does the straight from E.
        assert!(topo.conflicts(&r("N", "W"), &r("E", "W")));
    }

    #[test]
    fn right_turn_is_free_against_non_merging_traffic() {
        let topo = two_lane_four_way();
        assert!(!topo.conflicts(&r("N", "W"), &r("W", "E")));
        assert!(!topo.conflicts(&r("N", "W"), &r("S", "N")));
    }

    #[test]
    fn left_turn_conflicts_with_oncoming_straight() {
        let topo = two_lane_four_way();
        // From N the left turn exits E, crossing the S->N straight.
        assert!(topo.conflicts(&r("N", "E"), &r("S", "N")));
    }

    #[test]
    fn same_entry_conflicts() {
        let topo = two_lane_four_way();
        assert!(topo.conflicts(&r("N", "S"), &r("N", "W")));
    }

    #[test]
    fn movement_classification() {
        assert_eq!(movement(0, 2), Some(Movement::Straight));
        assert_eq!(movement(0, 3), Some(Movement::Right));
        assert_eq!(movement(0, 1), Some(Movement::Left));
        assert_eq!(movement(2, 1), Some(Movement::Right));
        assert_eq!(movement(1, 1), None);
    }
}
