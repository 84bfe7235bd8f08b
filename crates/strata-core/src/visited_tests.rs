//! Tests for the `visited` module.

use super::visited::VisitedListPool;

#[test]
fn test_fresh_generation_sees_nothing_visited() {
    let pool = VisitedListPool::new(1, 16);
    {
        let mut list = pool.acquire();
        assert!(list.check_and_mark(3));
        assert!(!list.check_and_mark(3));
        list.mark(7);
        assert!(!list.check_and_mark(7));
    }
    // Same buffer, new generation: previous marks are invisible.
    let mut list = pool.acquire();
    assert!(list.check_and_mark(3));
    assert!(list.check_and_mark(7));
}

#[test]
fn test_pool_grows_on_demand() {
    let pool = VisitedListPool::new(1, 8);
    let mut a = pool.acquire();
    let mut b = pool.acquire();
    a.mark(1);
    b.mark(2);
    assert!(!a.check_and_mark(1));
    assert!(!b.check_and_mark(2));
    // Each borrow has an independent generation tag space.
    assert!(a.check_and_mark(2));
    assert!(b.check_and_mark(1));
}

#[test]
fn test_generation_wraparound_clears() {
    let pool = VisitedListPool::new(1, 4);
    // Drive the generation counter through its full u16 range.
    for _ in 0..usize::from(u16::MAX) + 10 {
        let mut list = pool.acquire();
        assert!(list.check_and_mark(0), "stale mark survived a generation");
    }
}
