//! Integration tests for the underwater scene.
//!
//! A scripted random source pins down exact values for a single step; a
//! seeded RNG drives long runs that check the motion invariants.

use diorama::aquarium::{fish_size, Aquarium};
use diorama::config::AquariumConfig;
use diorama::{Demo, RandomSource, Vec3, Viewport};
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Hands out a fixed list of samples and fails the test if asked for more.
struct Scripted {
    samples: Vec<f32>,
    next: usize,
}

impl Scripted {
    fn new(samples: &[f32]) -> Self {
        Self {
            samples: samples.to_vec(),
            next: 0,
        }
    }

    fn drawn(&self) -> usize {
        self.next
    }
}

impl RandomSource for Scripted {
    fn next_f32(&mut self) -> f32 {
        let sample = *self
            .samples
            .get(self.next)
            .unwrap_or_else(|| panic!("drew sample #{} from a script of {}", self.next, self.samples.len()));
        self.next += 1;
        sample
    }
}

fn assert_close(actual: f32, expected: f32) {
    assert!((actual - expected).abs() < 1e-5, "expected {expected}, got {actual}");
}

fn assert_vec_close(actual: Vec3, expected: Vec3) {
    assert!(actual.abs_diff_eq(expected, 1e-5), "expected {expected}, got {actual}");
}

fn small_config(fish: usize, rain: usize) -> AquariumConfig {
    let mut config = AquariumConfig::default();
    config.fish.count = fish;
    config.rain.count = rain;
    config
}

// ============================================================================
// Exact single step
// ============================================================================

#[test]
fn test_single_step_is_exact() {
    #[rustfmt::skip]
    let mut rng = Scripted::new(&[
        // fish: position, velocity, size, color
        0.75, 0.5, 0.25,
        0.75, 0.25, 0.5,
        0.5,
        0.1, 0.2, 0.3,
        // rain: position, fall speed
        0.5, 0.0, 0.5,
        0.5,
    ]);
    let mut aquarium = Aquarium::new(small_config(1, 1), Viewport::new(1280.0, 720.0), &mut rng);
    assert_eq!(rng.drawn(), 14);

    let fish = aquarium.fish().unwrap();
    assert_vec_close(fish.positions.vec3(0), Vec3::new(5.0, 2.5, -5.0));
    assert_vec_close(aquarium.fish_velocities().vec3(0), Vec3::new(0.0125, -0.0125, 0.0));
    assert_close(fish.sizes.as_ref().unwrap().get(0, 0), 0.2);
    assert_vec_close(fish.colors.as_ref().unwrap().vec3(0), Vec3::new(0.1, 0.2, 0.3));

    let rain = aquarium.rain().unwrap();
    assert_vec_close(rain.positions.vec3(0), Vec3::new(0.0, 20.0, 0.0));
    assert_close(aquarium.rain_fall().get(0, 0), -0.15);

    aquarium.update(&mut rng);
    assert_eq!(rng.drawn(), 14, "a drop above the floor draws nothing");

    let fish = aquarium.fish().unwrap();
    assert_vec_close(fish.positions.vec3(0), Vec3::new(5.0125, 2.4875, -5.0));
    assert_vec_close(aquarium.fish_velocities().vec3(0), Vec3::new(0.0125, -0.0125, 0.0));
    // 1 - (5 - 2.4875) / 10 = 0.74875, times 0.2
    assert_close(fish.sizes.as_ref().unwrap().get(0, 0), 0.14975);

    assert_close(aquarium.rain().unwrap().positions.get(0, 1), 19.85);
    assert_eq!(aquarium.frames(), 1);
}

#[test]
fn test_drop_through_floor_draws_one_sample() {
    #[rustfmt::skip]
    let mut rng = Scripted::new(&[
        // rain: x, y, z, fall speed of about -0.2
        0.5, 0.0, 0.5, 0.999_999,
        // respawn height
        0.25,
    ]);
    let mut config = small_config(0, 1);
    config.rain.respawn_min = 0.1;
    config.rain.respawn_span = 0.0;
    let mut aquarium = Aquarium::new(config, Viewport::default(), &mut rng);
    assert_close(aquarium.rain().unwrap().positions.get(0, 1), 0.1);

    aquarium.update(&mut rng);
    assert_eq!(rng.drawn(), 5);
    // span 0: the respawn height is the minimum regardless of the sample
    assert_close(aquarium.rain().unwrap().positions.get(0, 1), 0.1);
}

// ============================================================================
// Long-run invariants
// ============================================================================

#[test]
fn test_fish_stay_in_bounds() {
    let mut rng = SmallRng::seed_from_u64(0xf15);
    let config = AquariumConfig::default();
    let slack = config.fish.velocity_extent / 2.0 + 1e-4;
    let mut aquarium = Aquarium::new(config, Viewport::default(), &mut rng);

    for frame in 0..3000 {
        aquarium.update(&mut rng);
        let bounds = aquarium.swim_bounds();
        let fish = aquarium.fish().unwrap();
        let sizes = fish.sizes.as_ref().unwrap();

        for i in 0..fish.count() {
            let p = fish.positions.vec3(i);
            assert!(bounds.contains(p, slack), "frame {frame}: fish {i} escaped to {p}");
            let size = sizes.get(i, 0);
            assert!((0.02 - 1e-6..=0.2 + 1e-6).contains(&size), "frame {frame}: size {size}");
            assert_close(size, fish_size(5.0, p.y, &aquarium.config().fish));
        }
    }
}

#[test]
fn test_fish_speed_is_preserved() {
    let mut rng = SmallRng::seed_from_u64(77);
    let mut aquarium = Aquarium::new(AquariumConfig::default(), Viewport::default(), &mut rng);
    let initial: Vec<Vec3> = (0..100).map(|i| aquarium.fish_velocities().vec3(i).abs()).collect();

    for _ in 0..1000 {
        aquarium.update(&mut rng);
    }

    for (i, speed) in initial.iter().enumerate() {
        assert_eq!(aquarium.fish_velocities().vec3(i).abs(), *speed);
    }
}

#[test]
fn test_rain_falls_then_recycles() {
    let mut rng = SmallRng::seed_from_u64(42);
    let config = AquariumConfig::default();
    let (min, max) = (config.rain.respawn_min, config.rain.respawn_min + config.rain.respawn_span);
    let mut aquarium = Aquarium::new(config, Viewport::default(), &mut rng);
    let fall = aquarium.rain_fall().as_slice().to_vec();
    let mut recycled = 0;

    for _ in 0..800 {
        let before: Vec<f32> = (0..fall.len()).map(|i| aquarium.rain().unwrap().positions.get(i, 1)).collect();
        aquarium.update(&mut rng);
        let rain = aquarium.rain().unwrap();

        for (i, (&y0, &vy)) in before.iter().zip(&fall).enumerate() {
            let y = rain.positions.get(i, 1);
            assert!(y >= 0.0);
            if y0 + vy < 0.0 {
                assert!((min..=max).contains(&y), "drop {i} respawned at {y}");
                recycled += 1;
            } else {
                assert_eq!(y, y0 + vy);
            }
        }
    }

    assert!(recycled > 0);
}

#[test]
fn test_resize_changes_boundary_not_population() {
    let mut rng = SmallRng::seed_from_u64(3);
    let mut aquarium = Aquarium::new(AquariumConfig::default(), Viewport::default(), &mut rng);
    aquarium.resize(Viewport::from_physical(winit::dpi::PhysicalSize::new(1600, 1200), 2.0));

    let bounds = aquarium.swim_bounds();
    assert_eq!(bounds.half_width, 8.0);
    assert_eq!(bounds.ceiling, 6.0);
    assert_eq!(aquarium.camera().aspect, 800.0 / 600.0);
    assert_eq!(aquarium.fish().unwrap().count(), 100);
    assert_eq!(aquarium.rain().unwrap().count(), 2000);
}
