//! Typed, run-wide constants set once at setup and read everywhere.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::MiasmaError;

/// Defines a new global property with the given value type.
#[macro_export]
macro_rules! define_global_property {
    ($global_property:ident, $value:ty) => {
        #[derive(Copy, Clone)]
        pub struct $global_property;

        impl $crate::global_properties::GlobalProperty for $global_property {
            type Value = $value;
        }
    };
}
pub use define_global_property;

pub trait GlobalProperty: Any {
    type Value: Any;
}

struct GlobalPropertiesData {
    properties: HashMap<TypeId, Box<dyn Any>>,
}

define_data_plugin!(
    GlobalPropertiesPlugin,
    GlobalPropertiesData,
    GlobalPropertiesData {
        properties: HashMap::new(),
    }
);

pub trait ContextGlobalPropertiesExt {
    /// Sets the value of a global property.
    ///
    /// # Errors
    ///
    /// Returns a `MiasmaError` if the property was already set; global
    /// properties are constants of the run, not mutable state.
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        property: T,
        value: T::Value,
    ) -> Result<(), MiasmaError>;

    /// Returns the value of a global property, or `None` if it was never set.
    fn get_global_property_value<T: GlobalProperty>(&self, property: T) -> Option<&T::Value>;

    /// Deserializes a value of type `T` from a JSON file, for feeding
    /// parameter structs into global properties.
    ///
    /// # Errors
    ///
    /// Returns a `MiasmaError` if the file cannot be read or parsed.
    fn load_parameters_from_json<T: DeserializeOwned>(
        &mut self,
        file_path: &Path,
    ) -> Result<T, MiasmaError>;
}

impl ContextGlobalPropertiesExt for Context {
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        _property: T,
        value: T::Value,
    ) -> Result<(), MiasmaError> {
        let data_container = self.get_data_container_mut::<GlobalPropertiesPlugin>();
        if data_container.properties.contains_key(&TypeId::of::<T>()) {
            return Err(MiasmaError::ConfigError(
                "Global property already set".to_string(),
            ));
        }
        data_container
            .properties
            .insert(TypeId::of::<T>(), Box::new(value));
        Ok(())
    }

    fn get_global_property_value<T: GlobalProperty>(&self, _property: T) -> Option<&T::Value> {
        let data_container = self.get_data_container::<GlobalPropertiesPlugin>()?;
        data_container
            .properties
            .get(&TypeId::of::<T>())
            .map(|boxed| boxed.downcast_ref::<T::Value>().unwrap())
    }

    fn load_parameters_from_json<T: DeserializeOwned>(
        &mut self,
        file_path: &Path,
    ) -> Result<T, MiasmaError> {
        let config_file = fs::read_to_string(file_path)?;
        let parameters: T = serde_json::from_str(&config_file)?;
        Ok(parameters)
    }
}
