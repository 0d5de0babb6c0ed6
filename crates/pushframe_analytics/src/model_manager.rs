//! Management of models persisted in the engine.

use pushframe_core::call::call_proc;
use pushframe_core::{ConnectionRef, Props, RemoteFrame};
use tracing::debug;

use crate::errors::Result;

/// Catalog view listing the models of the current database.
pub const MODELS_VIEW: &str = "INZA.V_NZA_MODELS";

pub struct ModelManager {
    conn: ConnectionRef,
}

impl ModelManager {
    pub fn new(conn: ConnectionRef) -> Self {
        ModelManager { conn }
    }

    /// All models known to the engine, as a frame.
    pub fn list_models(&self) -> Result<RemoteFrame> {
        Ok(RemoteFrame::from_table(self.conn.clone(), MODELS_VIEW)?)
    }

    pub fn model_exists(&self, name: &str) -> Result<bool> {
        let props = Props::new().set("model", name);
        let res = call_proc(self.conn.as_ref(), "MODEL_EXISTS", &props)?;
        Ok(res
            .and_then(|r| r.scalar().map(|v| v.truthy()))
            .unwrap_or(false))
    }

    /// Drops the model if it exists; absence is not an error.
    pub fn drop_model(&self, name: &str) -> Result<()> {
        if self.model_exists(name)? {
            debug!(model = %name, "dropping model");
            let props = Props::new().set("model", name);
            call_proc(self.conn.as_ref(), "DROP_MODEL", &props)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushframe_core::TabularResult;
    use pushframe_core::testing::MockConnection;

    #[test]
    fn drop_model_is_conditional() {
        let conn = MockConnection::new();
        let mm = ModelManager::new(conn.clone());

        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(false)));
        mm.drop_model("M1").unwrap();
        assert!(!conn.statements().iter().any(|s| s.contains("DROP_MODEL")));

        conn.clear_statements();
        let conn2 = MockConnection::new();
        conn2.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(true)));
        let mm2 = ModelManager::new(conn2.clone());
        mm2.drop_model("M1").unwrap();
        assert!(
            conn2
                .statements()
                .contains(&"call NZA..DROP_MODEL('model=M1')".to_string())
        );
    }

    #[test]
    fn model_exists_reads_the_scalar() {
        let conn = MockConnection::new();
        conn.script_result("MODEL_EXISTS", Some(TabularResult::scalar_result(1i64)));
        let mm = ModelManager::new(conn.clone());
        assert!(mm.model_exists("M").unwrap());
        assert!(
            conn.statements()
                .contains(&"call NZA..MODEL_EXISTS('model=M')".to_string())
        );
    }
}
