use merge_six_core::{CellCoord, EXPLOSION_VALUE, MAX_SPAWN_VALUE, MIN_TILE_VALUE};
use rand::{seq::SliceRandom, Rng};
use rand_chacha::ChaCha8Rng;

/// Initial contents of one cell of a freshly built board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TileSeed {
    pub(crate) cell: CellCoord,
    pub(crate) value: u8,
    pub(crate) locked: bool,
}

/// Lays out a board: random values everywhere, a level-dependent number of
/// placeholders, and at least one legal pair whenever two tiles fit.
pub(crate) fn generate(columns: u32, rows: u32, level: u32, rng: &mut ChaCha8Rng) -> Vec<TileSeed> {
    let mut seeds: Vec<TileSeed> = Vec::new();
    for row in 0..rows {
        for column in 0..columns {
            seeds.push(TileSeed {
                cell: CellCoord::new(column, row),
                value: rng.gen_range(MIN_TILE_VALUE..=MAX_SPAWN_VALUE),
                locked: false,
            });
        }
    }

    let placeholders = placeholder_count(seeds.len(), level);
    let mut order: Vec<usize> = (0..seeds.len()).collect();
    order.shuffle(rng);
    for index in order.iter().take(placeholders) {
        if let Some(seed) = seeds.get_mut(*index) {
            seed.locked = true;
            seed.value = 0;
        }
    }

    ensure_legal_pair(&mut seeds, rng);
    seeds
}

fn placeholder_count(cells: usize, level: u32) -> usize {
    let by_level = usize::try_from(level.saturating_sub(1)).unwrap_or(usize::MAX);
    by_level.min(cells / 4)
}

fn ensure_legal_pair(seeds: &mut [TileSeed], rng: &mut ChaCha8Rng) {
    let active: Vec<usize> = seeds
        .iter()
        .enumerate()
        .filter(|(_, seed)| !seed.locked)
        .map(|(index, _)| index)
        .collect();
    if active.len() < 2 {
        return;
    }

    let mut smallest: Vec<u8> = active
        .iter()
        .filter_map(|index| seeds.get(*index).map(|seed| seed.value))
        .collect();
    smallest.sort_unstable();
    let has_pair = match smallest.as_slice() {
        [first, second, ..] => first + second <= EXPLOSION_VALUE,
        _ => false,
    };
    if has_pair {
        return;
    }

    if let Some(index) = active.choose(rng) {
        if let Some(seed) = seeds.get_mut(*index) {
            seed.value = MIN_TILE_VALUE;
        }
    }
}
