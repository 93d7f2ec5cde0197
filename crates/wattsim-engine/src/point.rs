//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Monitoring points and the in-process point directory."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;
use wattsim_common::config::{check_point, PointConfig};

use crate::error::{ConfigError, SimError};

pub type SharedPoint = Arc<MonitoringPoint>;

/// A monitored consumer of energy.
///
/// Everything except `activo` is fixed once constructed. `activo` may be
/// flipped by the point directory at any time and is read fresh by every
/// generator call.
#[derive(Debug)]
pub struct MonitoringPoint {
    id: String,
    pub nombre: String,
    pub descripcion: String,
    pub ubicacion: String,
    activo: AtomicBool,
    consumo_base_kwh: f64,
    potencia_base_w: f64,
}

impl MonitoringPoint {
    pub fn new(
        id: impl Into<String>,
        nombre: impl Into<String>,
        consumo_base_kwh: f64,
        potencia_base_w: f64,
    ) -> Result<Self, ConfigError> {
        let id = id.into();
        if let Err(reason) = check_point(&id, consumo_base_kwh, potencia_base_w) {
            return Err(ConfigError::InvalidPoint { id, reason });
        }
        Ok(Self {
            id,
            nombre: nombre.into(),
            descripcion: String::new(),
            ubicacion: String::new(),
            activo: AtomicBool::new(true),
            consumo_base_kwh,
            potencia_base_w,
        })
    }

    pub fn from_config(id: &str, config: &PointConfig) -> Result<Self, ConfigError> {
        Ok(
            Self::new(id, config.nombre.clone(), config.consumo_base_kwh, config.potencia_base_w)?
                .with_details(config.descripcion.clone(), config.ubicacion.clone())
                .with_active(config.activo),
        )
    }

    pub fn with_details(mut self, descripcion: impl Into<String>, ubicacion: impl Into<String>) -> Self {
        self.descripcion = descripcion.into();
        self.ubicacion = ubicacion.into();
        self
    }

    pub fn with_active(self, activo: bool) -> Self {
        self.activo.store(activo, Ordering::Relaxed);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn consumo_base_kwh(&self) -> f64 {
        self.consumo_base_kwh
    }

    pub fn potencia_base_w(&self) -> f64 {
        self.potencia_base_w
    }

    pub fn is_active(&self) -> bool {
        self.activo.load(Ordering::Acquire)
    }

    pub fn set_active(&self, activo: bool) {
        self.activo.store(activo, Ordering::Release);
    }

    pub fn view(&self) -> PointView {
        PointView {
            id: self.id.clone(),
            nombre: self.nombre.clone(),
            descripcion: self.descripcion.clone(),
            ubicacion: self.ubicacion.clone(),
            activo: self.is_active(),
            consumo_base_kwh: self.consumo_base_kwh,
            potencia_base_w: self.potencia_base_w,
        }
    }
}

/// Serializable copy of a point at one instant.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PointView {
    pub id: String,
    pub nombre: String,
    pub descripcion: String,
    pub ubicacion: String,
    pub activo: bool,
    pub consumo_base_kwh: f64,
    pub potencia_base_w: f64,
}

/// Ordered directory of monitoring points.
///
/// Runs receive a [`snapshot`](PointRegistry::snapshot) of shared handles, so
/// toggling a point here is visible to an active run from its next cycle on.
#[derive(Debug, Default)]
pub struct PointRegistry {
    points: RwLock<IndexMap<String, SharedPoint>>,
}

impl PointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(points: &IndexMap<String, PointConfig>) -> Result<Self, ConfigError> {
        let registry = Self::new();
        for (id, config) in points {
            registry.insert(MonitoringPoint::from_config(id, config)?);
        }
        Ok(registry)
    }

    /// Insert or replace a point, keeping the original position on replace.
    pub fn insert(&self, point: MonitoringPoint) -> Option<SharedPoint> {
        self.points
            .write()
            .insert(point.id().to_owned(), Arc::new(point))
    }

    pub fn get(&self, id: &str) -> Option<SharedPoint> {
        self.points.read().get(id).cloned()
    }

    pub fn snapshot(&self) -> Vec<SharedPoint> {
        self.points.read().values().cloned().collect()
    }

    pub fn views(&self) -> Vec<PointView> {
        self.points.read().values().map(|point| point.view()).collect()
    }

    pub fn set_active(&self, id: &str, activo: bool) -> Result<(), SimError> {
        let point = self
            .get(id)
            .ok_or_else(|| SimError::UnknownPoint(id.to_owned()))?;
        point.set_active(activo);
        info!(point_id = id, activo, "point activity toggled");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_config(nombre: &str, activo: bool) -> PointConfig {
        PointConfig {
            nombre: nombre.into(),
            descripcion: "planta baja".into(),
            ubicacion: "edificio A".into(),
            activo,
            consumo_base_kwh: 2.5,
            potencia_base_w: 2500.0,
        }
    }

    #[test]
    fn rejects_invalid_baselines() {
        assert!(MonitoringPoint::new("p", "n", 0.0, 1.0).is_err());
        assert!(MonitoringPoint::new("p", "n", 1.0, -1.0).is_err());
        assert!(MonitoringPoint::new("p", "n", f64::NAN, 1.0).is_err());
        assert!(MonitoringPoint::new(" ", "n", 1.0, 1.0).is_err());
    }

    #[test]
    fn config_validation_and_construction_agree() {
        let mut config = point_config("Oficina", true);
        config.potencia_base_w = 0.0;
        let file_err = config.validate("p1").unwrap_err();
        let point_err = MonitoringPoint::from_config("p1", &config).unwrap_err();
        assert!(format!("{file_err}").contains("potencia_base_w must be positive"));
        assert!(matches!(
            point_err,
            ConfigError::InvalidPoint { ref id, reason: "potencia_base_w must be positive" } if id == "p1"
        ));

        config.potencia_base_w = 2500.0;
        assert!(config.validate("p1").is_ok());
        assert!(MonitoringPoint::from_config("p1", &config).is_ok());
    }

    #[test]
    fn from_config_carries_details() {
        let point = MonitoringPoint::from_config("p1", &point_config("Oficina", false)).unwrap();
        assert_eq!(point.id(), "p1");
        assert_eq!(point.ubicacion, "edificio A");
        assert!(!point.is_active());
        assert_eq!(point.view().potencia_base_w, 2500.0);
    }

    #[test]
    fn registry_keeps_order_and_toggles_shared_points() {
        let mut configs = IndexMap::new();
        configs.insert("b".to_owned(), point_config("B", true));
        configs.insert("a".to_owned(), point_config("A", true));
        let registry = PointRegistry::from_config(&configs).unwrap();

        let snapshot = registry.snapshot();
        let ids: Vec<_> = snapshot.iter().map(|p| p.id().to_owned()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        registry.set_active("a", false).unwrap();
        assert!(!snapshot[1].is_active());
        assert!(matches!(
            registry.set_active("zzz", true),
            Err(SimError::UnknownPoint(id)) if id == "zzz"
        ));
        assert_eq!(registry.len(), 2);
    }
}
