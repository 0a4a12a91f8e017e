use cellsim::cells::{CellListConfig, Dynamics};
use cellsim::core::{Particle, Simulation};
use cellsim::error::Result;
use cellsim::locals::{CylinderWall, PlaneWall};

fn no_skin() -> CellListConfig {
    CellListConfig {
        lambda: 0.0,
        ..Default::default()
    }
}

/// Energy conservation in an NVE hard-sphere gas.
/// Advance for many collisions and assert total kinetic energy remains
/// constant within a tight floating-point tolerance.
#[test]
fn energy_conservation_nve() -> Result<()> {
    let mut sim = Simulation::new(64, [20.0, 20.0, 20.0], 0.2, 1.0, Some(12345), CellListConfig::default())?;
    let e0 = sim.kinetic_energy();

    let t_end = 50.0;
    let steps = 200;
    for s in 1..=steps {
        let t = t_end * (s as f64) / (steps as f64);
        sim.advance_to(t)?;
    }

    let e1 = sim.kinetic_energy();
    let rel = ((e1 - e0) / e0).abs();
    assert!(
        rel < 1e-8,
        "relative energy drift {} too large (E0={}, E1={})",
        rel,
        e0,
        e1
    );
    let counts = sim.event_counts();
    assert!(counts.cell > 0);
    assert!(counts.p2p > 0);
    Ok(())
}

/// Look-ahead sufficiency in a dense gas: no pair ever overlaps, and every
/// pair closer than the grid's reach is in the cell neighbourhood.
#[test]
fn dense_gas_never_overlaps() -> Result<()> {
    let config = CellListConfig {
        oversize: 2.0,
        ..Default::default()
    };
    let mut sim = Simulation::new(200, [8.0; 3], 0.2, 1.0, Some(42), config)?;
    let reach = sim.cells().max_supported_interaction_length()?;

    for s in 1..=40 {
        sim.advance_to(0.25 * s as f64)?;
        let sys = sim.system();
        let n = sim.num_particles();
        let mut near = Vec::new();
        for p in 0..n {
            near.clear();
            sim.cells().neighbourhood(p, |q| near.push(q))?;
            for q in (p + 1)..n {
                let d = sys.separation(&sys.position(p), &sys.position(q));
                let dist = d.iter().map(|c| c * c).sum::<f64>().sqrt();
                assert!(dist >= 0.4 - 1e-9, "{p} and {q} overlap at t={}", sim.time());
                if dist < reach {
                    assert!(near.contains(&q), "{q} missing from the neighbourhood of {p}");
                }
            }
        }
    }
    assert!(sim.event_counts().p2p > 0);
    Ok(())
}

/// Each particle stays inside its stored cell's interaction box, and with no
/// skin the stored cell is exactly the one its position maps to.
#[test]
fn membership_tracks_positions() -> Result<()> {
    for config in [CellListConfig::default(), no_skin()] {
        let exact = config.lambda == 0.0;
        let mut sim = Simulation::new(100, [10.0; 3], 0.25, 1.0, Some(7), config)?;
        for s in 1..=30 {
            sim.advance_to(0.37 * s as f64)?;
            let cells = sim.cells();
            let grid = cells.grid()?;
            let width = grid.interaction_width();

            let mut listed = 0;
            for coords in grid.cells() {
                listed += cells.members(coords.cell_id()).count();
            }
            assert_eq!(listed, sim.num_particles());

            for p in 0..sim.num_particles() {
                let r = sim.system().position(p);
                let origin = cells.cell_origin_for(p, sim.system())?;
                for k in 0..3 {
                    assert!(r[k] >= origin[k] - 1e-9 && r[k] <= origin[k] + width[k] + 1e-9);
                }
                if exact {
                    let expected = cells.position_to_cell(sim.system(), r)?;
                    assert_eq!(cells.cell_of(p), Some(expected.cell_id()));
                }
            }
        }
    }
    Ok(())
}

/// Particles inside an elastic cylinder never get out, and energy is kept.
#[test]
fn cylinder_confines_particles() -> Result<()> {
    let mut particles = Vec::new();
    let mut id = 0;
    for i in -2..=2 {
        for j in -2..=2 {
            let (x, y) = (0.5 * i as f64, 0.5 * j as f64);
            if x * x + y * y > 1.0 {
                continue;
            }
            let v = [0.7 * (j as f64 + 0.3), -0.5 * (i as f64 - 0.2), 0.4];
            particles.push(Particle::new(id, [x, y, 0.1 * id as f64], v, 0.2, 1.0)?);
            id += 1;
        }
    }
    let mut sim = Simulation::from_particles(particles, [6.0; 3], CellListConfig::default())?;
    let wall = CylinderWall::new("tube", [0.0; 3], [0.0, 0.0, 1.0], 2.0, 1.0)?;
    sim.add_local(Box::new(wall.clone()))?;
    let e0 = sim.kinetic_energy();

    for s in 1..=50 {
        sim.advance_to(0.4 * s as f64)?;
        for p in sim.particles() {
            assert!(
                wall.axial_distance(&p.r) <= 2.0 + 1e-9,
                "particle {} escaped to {}",
                p.id,
                wall.axial_distance(&p.r)
            );
        }
    }
    assert!(sim.event_counts().local > 0);
    assert!(((sim.kinetic_energy() - e0) / e0).abs() < 1e-8);
    Ok(())
}

/// A plane sitting inside a cell, away from every face, still stops the
/// particle at the plane: the binding covers every cell the centre can touch
/// it from.
#[test]
fn plane_off_a_cell_face_is_never_crossed() -> Result<()> {
    let particles = vec![Particle::new(0, [1.5, 0.0, 0.0], [-1.0, 0.0, 0.0], 0.2, 1.0)?];
    let mut sim = Simulation::from_particles(particles, [6.0; 3], CellListConfig::default())?;
    assert_eq!(sim.cells().grid()?.count(), [14, 14, 14]);
    let wall = PlaneWall::new("wall", [0.4, 0.0, 0.0], [1.0, 0.0, 0.0], 1.0)?;
    sim.add_local(Box::new(wall))?;

    let mut min_x = f64::INFINITY;
    for s in 1..=150 {
        sim.advance_to(0.01 * s as f64)?;
        min_x = min_x.min(sim.particles()[0].r[0]);
    }
    assert!(min_x >= 0.4 - 1e-9, "centre reached x = {min_x}");
    // contact at t = 1.1, then 0.4 back out
    assert_eq!(sim.event_counts().local, 1);
    assert!((sim.particles()[0].r[0] - 0.8).abs() < 1e-9);
    assert!((sim.particles()[0].v[0] - 1.0).abs() < 1e-12);
    Ok(())
}
