use numpy::ndarray::{Array1, Array2};
use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::cells::CellListConfig;
use crate::core::particle::{Vec3, DIM};
use crate::core::Simulation;
use crate::locals::{CylinderWall, PlaneWall};

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn to_vec3(values: &[f64], what: &str) -> PyResult<Vec3> {
    if values.len() != DIM {
        return Err(py_err(format!("{what} must have length {DIM}")));
    }
    let mut out = [0.0f64; DIM];
    out.copy_from_slice(values);
    Ok(out)
}

/// CellSim Python-facing wrapper around the Rust Simulation core.
///
/// - __new__(num_particles, box_size, radius=1.0, mass=1.0, overlink=1, oversize=1.0, seed=None)
/// - advance_to(time)
/// - get_positions() -> np.ndarray, shape (N, 3)
/// - get_velocities() -> np.ndarray, shape (N, 3)
/// - get_cell_ids() -> np.ndarray, shape (N,)
/// - get_neighbours(i) -> list[int]
///
/// Cell-list observers are plain closures, so the object stays on the thread
/// that created it.
#[pyclass(unsendable)]
pub struct CellSim {
    sim: Simulation,
}

#[pymethods]
impl CellSim {
    /// Initialize a hard-sphere gas in a periodic 3D box centred on the origin.
    ///
    /// Errors: raises ValueError on invalid parameters or an unusable cell grid.
    #[new]
    #[pyo3(signature = (num_particles, box_size, radius=1.0, mass=1.0, overlink=1, oversize=1.0, seed=None))]
    fn new(
        num_particles: usize,
        box_size: Vec<f64>,
        radius: f64,
        mass: f64,
        overlink: usize,
        oversize: f64,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let bs = to_vec3(&box_size, "box_size")?;
        let config = CellListConfig {
            overlink,
            oversize,
            ..Default::default()
        };
        let sim = Simulation::new(num_particles, bs, radius, mass, seed, config).map_err(py_err)?;
        Ok(Self { sim })
    }

    /// Advance the simulation to the specified absolute time.
    fn advance_to(&mut self, target_time: f64) -> PyResult<()> {
        self.sim.advance_to(target_time).map_err(py_err)
    }

    fn time(&self) -> f64 {
        self.sim.time()
    }

    fn kinetic_energy(&self) -> f64 {
        self.sim.kinetic_energy()
    }

    /// Return positions as a NumPy array of shape (N, 3), dtype=float64.
    fn get_positions<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let n = self.sim.num_particles();
        let mut arr = Array2::<f64>::zeros((n, DIM));
        for (i, p) in self.sim.particles().iter().enumerate() {
            for k in 0..DIM {
                arr[[i, k]] = p.r[k];
            }
        }
        Ok(arr.into_pyarray(py).to_owned().into())
    }

    /// Return velocities as a NumPy array of shape (N, 3), dtype=float64.
    fn get_velocities<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let n = self.sim.num_particles();
        let mut arr = Array2::<f64>::zeros((n, DIM));
        for (i, p) in self.sim.particles().iter().enumerate() {
            for k in 0..DIM {
                arr[[i, k]] = p.v[k];
            }
        }
        Ok(arr.into_pyarray(py).to_owned().into())
    }

    /// Set all particle velocities from a NumPy array of shape (N, 3), dtype=float64.
    fn set_velocities<'py>(&mut self, velocities: PyReadonlyArray2<'py, f64>) -> PyResult<()> {
        let arr = velocities.as_array();
        let n = self.sim.num_particles();
        if arr.shape()[0] != n || arr.shape()[1] != DIM {
            return Err(py_err(format!(
                "velocities must have shape ({n}, {DIM}), got {:?}",
                arr.shape()
            )));
        }
        let vs: Vec<Vec3> = arr
            .rows()
            .into_iter()
            .map(|row| [row[0], row[1], row[2]])
            .collect();
        self.sim.set_velocities(&vs).map_err(py_err)
    }

    /// Return each particle's stored Morton cell id as an int64 array of shape (N,).
    fn get_cell_ids<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray1<i64>>> {
        let n = self.sim.num_particles();
        let mut arr = Array1::<i64>::zeros(n);
        for i in 0..n {
            arr[i] = self.sim.cells().cell_of(i).map_or(-1, |c| c as i64);
        }
        Ok(arr.into_pyarray(py).to_owned().into())
    }

    /// Particles in the cell neighbourhood of particle `i`.
    fn get_neighbours(&self, i: usize) -> PyResult<Vec<usize>> {
        if i >= self.sim.num_particles() {
            return Err(py_err(format!("particle index {i} out of range")));
        }
        let mut out = Vec::new();
        self.sim
            .cells()
            .neighbourhood(i, |q| out.push(q))
            .map_err(py_err)?;
        out.sort_unstable();
        Ok(out)
    }

    /// Add an infinite plane wall that particle centres reflect on; returns its local id.
    #[pyo3(signature = (name, origin, normal, elasticity=1.0))]
    fn add_plane_wall(
        &mut self,
        name: String,
        origin: Vec<f64>,
        normal: Vec<f64>,
        elasticity: f64,
    ) -> PyResult<usize> {
        let wall = PlaneWall::new(
            name,
            to_vec3(&origin, "origin")?,
            to_vec3(&normal, "normal")?,
            elasticity,
        )
        .map_err(py_err)?;
        self.sim.add_local(Box::new(wall)).map_err(py_err)
    }

    /// Add an infinite cylindrical wall confining particle centres to `radius`; returns its local id.
    #[pyo3(signature = (name, origin, axis, radius, elasticity=1.0))]
    fn add_cylinder_wall(
        &mut self,
        name: String,
        origin: Vec<f64>,
        axis: Vec<f64>,
        radius: f64,
        elasticity: f64,
    ) -> PyResult<usize> {
        let wall = CylinderWall::new(
            name,
            to_vec3(&origin, "origin")?,
            to_vec3(&axis, "axis")?,
            radius,
            elasticity,
        )
        .map_err(py_err)?;
        self.sim.add_local(Box::new(wall)).map_err(py_err)
    }
}

/// The cellsim Python module entry point.
#[pymodule]
fn cellsim(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<CellSim>()?;
    Ok(())
}
