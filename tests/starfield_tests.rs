//! Integration tests for the starfield scene.

use std::time::Duration;

use diorama::config::StarfieldConfig;
use diorama::geometry::Geometry;
use diorama::model::{self, Model};
use diorama::starfield::{Phase, Starfield};
use diorama::{Demo, Viewport};
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn sword() -> Model {
    // A stretched sphere stands in for the blade.
    let mut geometry = Geometry::sphere(1.0, 6, 4);
    for p in &mut geometry.positions {
        p[1] *= 8.0;
    }
    Model {
        geometry,
        mesh_count: 1,
    }
}

fn running(seed: u64) -> (Starfield, SmallRng) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut starfield = Starfield::new(StarfieldConfig::default(), Viewport::default(), &mut rng);
    starfield.attach_model(sword());
    (starfield, rng)
}

fn star_z(starfield: &Starfield) -> Vec<f32> {
    starfield.stars().iter().map(|s| starfield.star_position(s).z).collect()
}

#[test]
fn test_stars_approach_camera_then_reset() {
    let (mut starfield, mut rng) = running(10);
    let camera_z = starfield.camera().position.z;
    let reset_z = starfield.config().stars.reset_z;
    let mut resets = 0;

    for frame in 0..2000 {
        let before = star_z(&starfield);
        let speeds: Vec<f32> = starfield.stars().iter().map(|s| s.speed.speed()).collect();
        starfield.update(&mut rng);
        let after = star_z(&starfield);

        for (i, star) in starfield.stars().iter().enumerate() {
            let speed = star.speed.speed();
            assert!(speed >= speeds[i], "frame {frame}: star {i} slowed down");
            assert!(speed <= star.speed.max());

            if before[i] + speed > camera_z {
                assert_eq!(after[i], reset_z, "frame {frame}: star {i} not recycled");
                resets += 1;
            } else {
                assert_eq!(after[i], before[i] + speed);
                assert!((camera_z - after[i]) < (camera_z - before[i]));
            }
        }
    }

    assert!(resets > 0);
}

#[test]
fn test_stars_keep_xy() {
    let (mut starfield, mut rng) = running(11);
    let xy: Vec<(f32, f32)> = starfield
        .stars()
        .iter()
        .map(|s| {
            let p = starfield.star_position(s);
            (p.x, p.y)
        })
        .collect();

    for _ in 0..500 {
        starfield.update(&mut rng);
    }

    for (star, (x, y)) in starfield.stars().iter().zip(xy) {
        let p = starfield.star_position(star);
        assert_eq!((p.x, p.y), (x, y));
    }
}

#[test]
fn test_sword_spin_accelerates_to_cap() {
    let (mut starfield, mut rng) = running(12);
    let cap = starfield.config().sword.spin.max;
    let mut angle = starfield.sword_angle().unwrap();
    let mut last_step = 0.0;

    for _ in 0..1000 {
        starfield.update(&mut rng);
        let next = starfield.sword_angle().unwrap();
        let step = next - angle;
        assert!(step > 0.0);
        assert!(step >= last_step - 1e-5, "spin slowed from {last_step} to {step}");
        assert!(step <= cap + 1e-5);
        angle = next;
        last_step = step;
    }

    assert_eq!(starfield.sword().unwrap().spin.speed(), cap);
}

#[test]
fn test_model_file_load_starts_scene() {
    let mut rng = SmallRng::seed_from_u64(13);
    let mut starfield = Starfield::new(StarfieldConfig::default(), Viewport::default(), &mut rng);
    starfield.load(model::load_with(|| Ok(sword())));

    for _ in 0..1000 {
        starfield.update(&mut rng);
        if starfield.phase() == Phase::Running {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(starfield.phase(), Phase::Running);
    let before = star_z(&starfield);
    starfield.update(&mut rng);
    assert_ne!(before, star_z(&starfield));
}

#[test]
fn test_missing_model_file_freezes_scene() {
    let mut rng = SmallRng::seed_from_u64(14);
    let mut starfield = Starfield::new(StarfieldConfig::default(), Viewport::default(), &mut rng);
    starfield.load(model::load_async("/no/such/dir/sword.glb"));
    let before = star_z(&starfield);

    for _ in 0..1000 {
        starfield.update(&mut rng);
        if !starfield.is_waiting() {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    assert!(!starfield.is_waiting());
    for _ in 0..10 {
        starfield.update(&mut rng);
    }
    assert_eq!(starfield.phase(), Phase::Loading);
    assert_eq!(star_z(&starfield), before);
    assert!(starfield.sword().is_none());
}
