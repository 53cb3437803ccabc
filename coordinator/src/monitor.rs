use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::state::Registry;

impl Registry {
    /// IsDone: true sólo si todas las tareas están DONE y el contador de
    /// requests no se movió durante la ventana de estabilidad.
    ///
    /// El contador es una heurística de "no hay tráfico": un worker callado
    /// más tiempo que la ventana no se detecta.
    pub async fn is_done(&self) -> bool {
        let before = {
            let st = self.lock();
            if !st.all_done() {
                return false;
            }
            st.request_count
        };

        sleep(self.timing().stability_window).await;

        let after = self.request_count();
        if before != after {
            debug!(
                "todas las tareas DONE pero hubo {} requests en la ventana",
                after - before
            );
            return false;
        }
        true
    }

    /// Llama a `is_done` cada `poll` hasta que devuelva true.
    pub async fn wait_until_done(&self, poll: Duration) {
        loop {
            if self.is_done().await {
                info!("job completo");
                return;
            }
            sleep(poll).await;
        }
    }
}
