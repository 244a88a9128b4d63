//! `tkfdl pool-demo` – several threads borrowing browser instances at once.

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tkfdl_core::config::TkfConfig;
use tkfdl_core::pool::{BrowserPool, HeadlessEngine};

pub fn run_pool_demo(cfg: &TkfConfig, count: usize) -> Result<()> {
    let created = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));
    let pool = {
        let created = Arc::clone(&created);
        let destroyed = Arc::clone(&destroyed);
        Arc::new(BrowserPool::new(cfg.pool_capacity, move || {
            let id = created.fetch_add(1, Ordering::SeqCst);
            HeadlessEngine::new(id, Arc::clone(&destroyed))
        }))
    };

    for round in 0..2 {
        let handles: Vec<_> = (0..count)
            .map(|i| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let mut engine = pool.acquire();
                    engine.attach_to(&format!("screen-{i}"));
                    engine.navigate(&format!("https://forms.example/page/{i}"));
                    pool.release(engine);
                })
            })
            .collect();
        for h in handles {
            if h.join().is_err() {
                anyhow::bail!("pool demo thread panicked");
            }
        }
        println!(
            "round {}: created {}, destroyed {}, idle {}/{}",
            round + 1,
            created.load(Ordering::SeqCst),
            destroyed.load(Ordering::SeqCst),
            pool.idle_len(),
            pool.capacity()
        );
    }

    pool.clear();
    println!("after clear: destroyed {}", destroyed.load(Ordering::SeqCst));
    Ok(())
}
