use rand::Rng;

/// Fixed size of one remote result page
pub const PAGE_SIZE: u32 = 25;

/// Half-width in degrees of the search bounding box around a marker
pub const BBOX_HALF_WIDTH_DEG: f64 = 5.0;

/// Number of remote pages implied by a total result count
pub fn page_count(remote_total: f64) -> u32 {
    (remote_total / PAGE_SIZE as f64).ceil() as u32
}

/// Pick the next page to request for an album
///
/// An unknown total (nothing fetched yet) always maps to page 1. A known
/// total maps to a page drawn uniformly from `[0, page_count)`, so repeated
/// refreshes surface different slices of the remote result set instead of
/// re-fetching the same page every time.
pub fn next_page<R: Rng>(remote_total: f64, rng: &mut R) -> u32 {
    if remote_total <= 0.0 {
        return 1;
    }

    let pages = page_count(remote_total);
    if pages == 0 {
        return 1;
    }

    rng.gen_range(0..pages)
}

/// [`next_page`] with the thread-local RNG
pub fn next_page_thread_rng(remote_total: f64) -> u32 {
    next_page(remote_total, &mut rand::thread_rng())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_total_maps_to_page_one() {
        let mut rng = rand::thread_rng();
        assert_eq!(next_page(0.0, &mut rng), 1);
    }

    #[test]
    fn single_page_total_always_picks_page_zero() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            assert_eq!(next_page(25.0, &mut rng), 0);
        }
    }

    #[test]
    fn picks_within_page_count_and_covers_all_pages() {
        let mut rng = rand::thread_rng();
        let mut seen = [false; 5];

        // 120 results at 25 per page is 5 pages; over 1000 draws every page
        // should come up at least once
        for _ in 0..1000 {
            let page = next_page(120.0, &mut rng);
            assert!(page < 5, "page {} out of range", page);
            seen[page as usize] = true;
        }

        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn partial_last_page_counts() {
        assert_eq!(page_count(120.0), 5);
        assert_eq!(page_count(101.0), 5);
        assert_eq!(page_count(100.0), 4);
        assert_eq!(page_count(1.0), 1);
    }
}
