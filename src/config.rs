//! Opciones de traducción.

/// Parámetros que afectan a una traducción.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Valor fijo para referencias a `@data` y `offset`.
    ///
    /// Si no se especifica, la primera referencia elige un valor
    /// arbitrario que se reutiliza en el resto de la traducción.
    pub data_pointer: Option<u16>,
}

impl Config {
    pub fn with_data_pointer(self, data_pointer: u16) -> Self {
        Config {
            data_pointer: Some(data_pointer),
        }
    }
}
