//! Sample feature plugin for the console host. Remembers when it was
//! started and reports its uptime when the host unloads it.

use std::sync::Mutex;
use std::time::Instant;

use solstice_contracts::{BoxError, Feature};

#[derive(Default)]
pub struct Clock {
    started: Mutex<Option<Instant>>,
}

impl Feature for Clock {
    fn name(&self) -> &str {
        "clock"
    }

    fn start(&self) -> Result<(), BoxError> {
        *self.started.lock().map_err(|e| e.to_string())? = Some(Instant::now());
        println!("[clock] started");
        Ok(())
    }

    fn dispose(&self) -> Result<(), BoxError> {
        let started = self.started.lock().map_err(|e| e.to_string())?.take();
        match started {
            Some(at) => println!("[clock] disposed after {:.1}s", at.elapsed().as_secs_f64()),
            None => println!("[clock] disposed before start"),
        }
        Ok(())
    }
}

solstice_contracts::export_feature!(Clock);
