/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Python FFI bindings via PyO3.
//!
//! Exposes enrollment, estimation and confirmation to a Python robot
//! controller. Tuning beyond the update rule, warm-up and fusion batch is
//! left to the Rust API.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from mmibn_core import IdentityModel, Observation
//!
//! model = IdentityModel(update_method="evidence", num_recog_min=5)
//! model.begin_session(registering=True)
//! obs = Observation(faces=[], gender="Female", gender_confidence=0.9,
//!                   age=31.0, age_confidence=0.6, height=162.0,
//!                   height_confidence=0.8, time="10:15:00", weekday=2)
//! print(model.estimate(obs))       # ('0', -1.0)
//! model.register("1", "Ana", "Female", 31, 162.0, "10:15:00", 2)
//! model.confirm("1")
//! print(model.num_identities)      # 2
//! ```

#![allow(non_snake_case)]

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::{RecogniserConfig, UpdateMethod};
use crate::database::{IdentityRecord, UNKNOWN_ID};
use crate::error::IdentityError;
use crate::model::IdentityModel as RustIdentityModel;
use crate::observation::{
    FaceReading, Gender, GenderReading, InteractionTime, Observation as RustObservation,
    RangeReading,
};

fn to_py_err(e: IdentityError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn parse_gender(label: Option<&str>) -> PyResult<Option<Gender>> {
    match label {
        None => Ok(None),
        Some(l) => Gender::parse(l)
            .map(Some)
            .ok_or_else(|| PyValueError::new_err(format!("gender must be Female or Male, got {l}"))),
    }
}

fn parse_update_method(label: &str) -> PyResult<UpdateMethod> {
    match label.to_ascii_lowercase().as_str() {
        "none" => Ok(UpdateMethod::None),
        "sum" => Ok(UpdateMethod::Sum),
        "avg" => Ok(UpdateMethod::Avg),
        "evidence" => Ok(UpdateMethod::Evidence),
        other => Err(PyValueError::new_err(format!(
            "update_method must be none, sum, avg or evidence, got {other}"
        ))),
    }
}

// ── Observation ──────────────────────────────────────────────────────────────

/// One multi-modal reading of the person in front of the robot.
#[pyclass(name = "Observation")]
#[derive(Clone)]
pub struct PyObservation {
    inner: RustObservation,
}

#[pymethods]
impl PyObservation {
    /// Create an observation.
    ///
    /// Args:
    ///     faces:             list of (identity id, similarity) from the face recogniser
    ///     gender:            "Female" or "Male"
    ///     gender_confidence: in [0.0, 1.0]
    ///     age, height:       estimates in years and cm
    ///     *_confidence:      in [0.0, 1.0]
    ///     time:              "HH:MM:SS"
    ///     weekday:           1 (Monday) to 7
    ///     face_accuracy:     recogniser accuracy, 1.0 if unknown
    #[new]
    #[pyo3(signature = (faces, gender, gender_confidence, age, age_confidence, height, height_confidence, time, weekday, face_accuracy=1.0))]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        faces: Vec<(String, f64)>,
        gender: &str,
        gender_confidence: f64,
        age: f64,
        age_confidence: f64,
        height: f64,
        height_confidence: f64,
        time: &str,
        weekday: u8,
        face_accuracy: f64,
    ) -> PyResult<Self> {
        let gender = parse_gender(Some(gender))?.unwrap_or(Gender::Female);
        let time = InteractionTime::parse(time, weekday).map_err(to_py_err)?;
        Ok(Self {
            inner: RustObservation {
                face: FaceReading {
                    accuracy: face_accuracy,
                    candidates: faces,
                },
                gender: GenderReading {
                    gender,
                    confidence: gender_confidence,
                },
                age: RangeReading {
                    value: age,
                    confidence: age_confidence,
                },
                height: RangeReading {
                    value: height,
                    confidence: height_confidence,
                },
                time,
            },
        })
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!(
            "Observation(faces={}, gender={:?}, age={:.1}, height={:.1})",
            self.inner.face.candidates.len(),
            self.inner.gender.gender,
            self.inner.age.value,
            self.inner.height.value,
        )
    }
}

// ── IdentityModel ────────────────────────────────────────────────────────────

/// Open-world identity model that learns from confirmed recognitions.
#[pyclass(name = "IdentityModel")]
pub struct PyIdentityModel {
    inner: RustIdentityModel,
}

#[pymethods]
impl PyIdentityModel {
    /// Create an empty model.
    ///
    /// Args:
    ///     update_method: "none", "sum", "avg" or "evidence"
    ///     num_recog_min: confirmations before the model names anyone
    ///     fusion_batch:  readings fused per estimate, None to disable fusion
    #[new]
    #[pyo3(signature = (update_method="none", num_recog_min=5, fusion_batch=None))]
    pub fn new(update_method: &str, num_recog_min: u32, fusion_batch: Option<usize>) -> PyResult<Self> {
        let method = parse_update_method(update_method)?;
        let config = RecogniserConfig::default()
            .with_update_method(method, None)
            .with_num_recog_min(num_recog_min)
            .with_fusion(fusion_batch.is_some(), fusion_batch.unwrap_or(1));
        let inner = RustIdentityModel::new(config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Enroll an identity directly. Returns False if the id already exists.
    ///
    /// Args:
    ///     times: list of ("HH:MM:SS", weekday) interaction times
    #[pyo3(signature = (id, name, gender=None, age=35, height=165.0, times=Vec::new()))]
    pub fn enroll(
        &mut self,
        id: String,
        name: String,
        gender: Option<&str>,
        age: u32,
        height: f64,
        times: Vec<(String, u8)>,
    ) -> PyResult<bool> {
        let gender = parse_gender(gender)?;
        let times = times
            .iter()
            .map(|(t, d)| InteractionTime::parse(t, *d))
            .collect::<Result<Vec<_>, _>>()
            .map_err(to_py_err)?;
        let record = IdentityRecord::new(id, name, gender, age, height, times);
        Ok(self.inner.enroll_identity(record))
    }

    /// Start a new interaction.
    #[pyo3(signature = (registering=false))]
    pub fn begin_session(&mut self, registering: bool) {
        self.inner.begin_session(registering, None);
    }

    /// Attach the record to enroll if this interaction turns out to be a new person.
    #[pyo3(signature = (id, name, gender, age, height, time, weekday))]
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &mut self,
        id: String,
        name: String,
        gender: Option<&str>,
        age: u32,
        height: f64,
        time: &str,
        weekday: u8,
    ) -> PyResult<()> {
        let gender = parse_gender(gender)?;
        let time = InteractionTime::parse(time, weekday).map_err(to_py_err)?;
        self.inner
            .set_pending_enrollment(IdentityRecord::new(id, name, gender, age, height, vec![time]));
        Ok(())
    }

    /// Estimate the identity behind one observation.
    ///
    /// Returns (identity id, quality), or None when no face was seen.
    pub fn estimate(&mut self, observation: Option<PyObservation>) -> Option<(String, f64)> {
        self.inner
            .estimate_identity(observation.map(|o| o.inner))
            .map(|e| (e.identity, e.quality))
    }

    /// Estimate from a batch of readings, fused when the model was built with a batch.
    pub fn estimate_batch(&mut self, observations: Vec<Option<PyObservation>>) -> Option<(String, f64)> {
        let readings: Vec<Option<RustObservation>> =
            observations.into_iter().map(|o| o.map(|o| o.inner)).collect();
        self.inner
            .estimate_identity_from(&readings)
            .map(|e| (e.identity, e.quality))
    }

    /// Confirm the last estimate, or correct it with `id`. Returns the confirmed id.
    #[pyo3(signature = (id=None))]
    pub fn confirm(&mut self, id: Option<&str>) -> PyResult<String> {
        self.inner
            .confirm_identity(id)
            .map(|c| c.identity)
            .map_err(to_py_err)
    }

    /// Identities including unknown.
    #[getter]
    pub fn num_identities(&self) -> usize {
        self.inner.num_identities()
    }

    /// Confirmed recognitions so far.
    #[getter]
    pub fn num_recognitions(&self) -> u32 {
        self.inner.num_recognitions()
    }

    /// Identity ids, unknown first.
    #[getter]
    pub fn labels(&self) -> Vec<String> {
        self.inner.labels()
    }

    /// Posterior of the last estimate, aligned with `labels`.
    #[getter]
    pub fn posterior(&self) -> Option<Vec<f64>> {
        self.inner.session().posterior().map(<[f64]>::to_vec)
    }

    /// Id the next enrollment should use.
    pub fn next_identifier(&self) -> String {
        self.inner.next_identifier()
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!(
            "IdentityModel(identities={}, recognitions={})",
            self.inner.num_identities(),
            self.inner.num_recognitions(),
        )
    }
}

// ── Module entry point ───────────────────────────────────────────────────────

/// Multi-modal identity recognition Python bindings.
#[pymodule]
pub fn mmibn_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyObservation>()?;
    m.add_class::<PyIdentityModel>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("UNKNOWN_ID", UNKNOWN_ID)?;
    Ok(())
}
