//! Genetic algorithm driver (component C6).
//!
//! A gene is a part's position in the placement order plus its chosen
//! rotation; an [`Individual`] is a full vector of genes. Rather than
//! storing the ordered, rotated `Vec<Polygon>` directly (each rotation
//! would mint a fresh `id`, so two equal individuals would never
//! compare equal), an `Individual` stores the order permutation and a
//! parallel rotation vector over a fixed base part list, and
//! [`Individual::expand`] materializes the actual polygons on demand
//! — see DESIGN.md for this design choice.

use crate::config::Config;
use crate::part::Polygon;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct Individual {
    /// `order[i]` is the index into the base part list placed at
    /// position `i`.
    pub order: Vec<usize>,
    /// `rotation[i]` is the absolute rotation (degrees) applied to
    /// `order[i]`'s part.
    pub rotation: Vec<f64>,
    pub fitness: Option<f64>,
}

impl Individual {
    pub fn identity(n: usize) -> Self {
        Self { order: (0..n).collect(), rotation: vec![0.0; n], fitness: None }
    }

    /// Materialize this individual's gene into actual placement-ready
    /// polygons, in order, each rotated to its chosen angle.
    pub fn expand(&self, base_parts: &[Polygon]) -> Vec<Polygon> {
        self.order
            .iter()
            .zip(&self.rotation)
            .map(|(&idx, &angle)| {
                let base = &base_parts[idx];
                base.rotate(angle - base.rotation)
            })
            .collect()
    }
}

/// Population-level GA state. Owns the base (unexpanded,
/// zero-rotation) part list; individuals are indices/angles over it.
pub struct GeneticAlgorithm {
    pub config: Config,
    pub base_parts: Vec<Polygon>,
    pub population: Vec<Individual>,
    rotation_sets: Vec<Vec<f64>>,
}

impl GeneticAlgorithm {
    /// New population of `config.population_size`: individual 0 is the
    /// canonical order with zero rotations, the rest are mutations of
    /// it.
    pub fn new(config: Config, base_parts: Vec<Polygon>, rng: &mut impl Rng) -> Self {
        let n = base_parts.len();
        let full_rotations = config.rotation_set();
        let rotation_sets: Vec<Vec<f64>> = base_parts
            .iter()
            .map(|p| if has_bilateral_symmetry(p) { halve(&full_rotations) } else { full_rotations.clone() })
            .collect();

        let seed = Individual::identity(n);
        let mut population = Vec::with_capacity(config.population_size as usize);
        population.push(seed.clone());
        for _ in 1..config.population_size.max(1) {
            population.push(mutate(&seed, &config, &rotation_sets, rng));
        }

        Self { config, base_parts, population, rotation_sets }
    }

    /// Run one generation: evaluate every individual without a known
    /// fitness, sort ascending (lower fitness is better, matching the
    /// placer's penalty-style score), then breed the next generation
    /// with elitism.
    pub fn generation(&mut self, mut evaluate: impl FnMut(&Individual) -> f64, rng: &mut impl Rng) {
        for individual in &mut self.population {
            if individual.fitness.is_none() {
                individual.fitness = Some(evaluate(individual));
            }
        }
        self.population.sort_by(|a, b| a.fitness.unwrap_or(f64::MAX).total_cmp(&b.fitness.unwrap_or(f64::MAX)));

        let elite = self.population[0].clone();
        let pop_size = self.population.len().max(1);
        let mut next = Vec::with_capacity(pop_size);
        next.push(elite);
        while next.len() < pop_size {
            let a_idx = weighted_pick(self.population.len(), rng);
            let b_idx = weighted_pick(self.population.len(), rng);
            let child = mate(&self.population[a_idx], &self.population[b_idx], rng);
            next.push(mutate(&child, &self.config, &self.rotation_sets, rng));
        }
        self.population = next;
    }

    /// Best individual in the current population (lowest fitness),
    /// after at least one [`Self::generation`] call.
    pub fn best(&self) -> Option<&Individual> {
        self.population.iter().min_by(|a, b| a.fitness.unwrap_or(f64::MAX).total_cmp(&b.fitness.unwrap_or(f64::MAX)))
    }
}

fn has_bilateral_symmetry(p: &Polygon) -> bool {
    p.children.is_empty() && p.is_rectangle(crate::geometry::RECTANGLE_TOLERANCE)
}

fn halve(rotations: &[f64]) -> Vec<f64> {
    if rotations.len() <= 1 {
        return rotations.to_vec();
    }
    rotations.iter().take(rotations.len() / 2).copied().collect()
}

/// Weighted index pick over an ascending-fitness-sorted population:
/// rank 0 (best) has weight `n`, rank `n-1` (worst) has weight `1`.
fn weighted_pick(n: usize, rng: &mut impl Rng) -> usize {
    if n == 0 {
        return 0;
    }
    let total: u64 = (1..=n as u64).sum();
    let mut r = rng.gen_range(0..total);
    for i in 0..n {
        let w = (n - i) as u64;
        if r < w {
            return i;
        }
        r -= w;
    }
    n - 1
}

/// Single-cut-point order crossover: the
/// child inherits `a`'s prefix verbatim, then appends whatever parts
/// `b` has that the prefix is missing, in `b`'s relative order, each
/// keeping the rotation it had in `b`.
fn mate(a: &Individual, b: &Individual, rng: &mut impl Rng) -> Individual {
    let n = a.order.len();
    if n < 2 {
        return a.clone();
    }
    let cut = rng.gen_range(1..n);

    let mut order = a.order[..cut].to_vec();
    let mut rotation = a.rotation[..cut].to_vec();
    let seen: std::collections::HashSet<usize> = order.iter().copied().collect();

    for (&idx, &angle) in b.order.iter().zip(&b.rotation) {
        if !seen.contains(&idx) {
            order.push(idx);
            rotation.push(angle);
        }
    }

    Individual { order, rotation, fitness: None }
}

/// Per-gene mutation: with probability
/// `mutation_rate/100`, either swap the gene with its neighbor (order
/// mutation) or resample its rotation from that part's discrete set.
fn mutate(individual: &Individual, config: &Config, rotation_sets: &[Vec<f64>], rng: &mut impl Rng) -> Individual {
    let mut order = individual.order.clone();
    let mut rotation = individual.rotation.clone();
    let n = order.len();
    let threshold = config.mutation_rate.min(100) as f64 / 100.0;

    for i in 0..n {
        if rng.gen::<f64>() >= threshold {
            continue;
        }
        if rng.gen_bool(0.5) && n > 1 {
            let j = (i + 1) % n;
            order.swap(i, j);
            rotation.swap(i, j);
        } else {
            let part_idx = order[i];
            let choices = &rotation_sets[part_idx];
            if !choices.is_empty() {
                rotation[i] = choices[rng.gen_range(0..choices.len())];
            }
        }
    }

    Individual { order, rotation, fitness: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn square(side: f64, source: u32) -> Polygon {
        Polygon::new(vec![Point::new(0.0, 0.0), Point::new(side, 0.0), Point::new(side, side), Point::new(0.0, side)], source)
    }

    fn parts(n: usize) -> Vec<Polygon> {
        (0..n).map(|i| square(10.0, i as u32)).collect()
    }

    #[test]
    fn identity_individual_is_in_order_with_zero_rotation() {
        let ind = Individual::identity(4);
        assert_eq!(ind.order, vec![0, 1, 2, 3]);
        assert!(ind.rotation.iter().all(|&r| r == 0.0));
    }

    #[test]
    fn expand_applies_rotation_and_preserves_order() {
        let base = parts(2);
        let ind = Individual { order: vec![1, 0], rotation: vec![90.0, 0.0], fitness: None };
        let expanded = ind.expand(&base);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].source, 1);
        assert!((expanded[0].rotation - 90.0).abs() < 1e-9);
        assert_eq!(expanded[1].source, 0);
    }

    #[test]
    fn mate_child_has_every_index_exactly_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Individual { order: vec![0, 1, 2, 3], rotation: vec![0.0; 4], fitness: None };
        let b = Individual { order: vec![3, 2, 1, 0], rotation: vec![90.0; 4], fitness: None };
        let child = mate(&a, &b, &mut rng);
        let mut sorted = child.order.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
        assert_eq!(child.rotation.len(), 4);
    }

    #[test]
    fn mutate_with_zero_rate_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(1);
        let config = Config { mutation_rate: 0, ..Config::default() };
        let rotation_sets = vec![vec![0.0, 90.0, 180.0, 270.0]; 3];
        let ind = Individual::identity(3);
        let mutated = mutate(&ind, &config, &rotation_sets, &mut rng);
        assert_eq!(mutated.order, ind.order);
        assert_eq!(mutated.rotation, ind.rotation);
    }

    #[test]
    fn generation_keeps_best_individual_via_elitism() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = Config { population_size: 5, mutation_rate: 50, rotations: 4, ..Config::default() };
        let mut ga = GeneticAlgorithm::new(config, parts(3), &mut rng);
        ga.generation(|ind| ind.order.iter().map(|&i| i as f64).sum(), &mut rng);
        let best_before = ga.best().unwrap().fitness.unwrap();
        ga.generation(|ind| ind.order.iter().map(|&i| i as f64).sum(), &mut rng);
        let best_after = ga.best().unwrap().fitness.unwrap();
        assert!(best_after <= best_before + 1e-9);
    }
}
