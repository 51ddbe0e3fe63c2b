//! Driver loops.
//!
//! The machine is shared by two activities: a CPU thread stepping at the
//! configured instruction rate, and the caller's presentation loop that
//! forwards input, ticks timers and reads the framebuffer at 60Hz.
//! Every step and every frame holds the lock for its whole duration.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
};

use log::{debug, error, info};

use crate::{
    clock::Clock,
    error::{Chip8Error, Chip8Result},
    keypad::KeyCode,
    vm::Chip8Vm,
};

pub struct Runner {
    vm: Arc<Mutex<Chip8Vm>>,
    /// Cleared to stop both loops.
    running: Arc<AtomicBool>,
    cpu_thread: Option<JoinHandle<Chip8Result<()>>>,
}

impl Runner {
    /// Start executing the loaded program on a new thread.
    pub fn spawn(vm: Chip8Vm) -> Chip8Result<Self> {
        if !vm.is_loaded() {
            return Err(Chip8Error::NotLoaded);
        }

        let frequency = vm.config().clock_frequency;
        let vm = Arc::new(Mutex::new(vm));
        let running = Arc::new(AtomicBool::new(true));

        let cpu_thread = {
            let vm = vm.clone();
            let running = running.clone();
            thread::Builder::new()
                .name("chip8-cpu".to_string())
                .spawn(move || {
                    info!("cpu thread started at {}Hz", frequency.0);
                    let mut clock = Clock::new(frequency);

                    while running.load(Ordering::Acquire) {
                        let result = lock(&vm).step();
                        if let Err(err) = result {
                            running.store(false, Ordering::Release);
                            return Err(err);
                        }

                        clock.wait();
                    }

                    debug!("cpu thread stopped");
                    Ok(())
                })?
        };

        Ok(Self {
            vm,
            running,
            cpu_thread: Some(cpu_thread),
        })
    }

    /// Whether the CPU thread is still executing.
    ///
    /// Turns false when the machine faults.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Forward the pressed key from the input source.
    pub fn set_key(&self, key: Option<KeyCode>) {
        lock(&self.vm).set_key(key);
    }

    /// One presentation tick.
    ///
    /// Counts down the timers and hands the machine to `present`, while
    /// holding the lock, so the framebuffer is not torn by a draw.
    pub fn frame<R>(&self, present: impl FnOnce(&Chip8Vm) -> R) -> R {
        let mut vm = lock(&self.vm);
        vm.tick_timers();
        present(&*vm)
    }

    /// Lock the machine for inspection.
    pub fn vm(&self) -> MutexGuard<'_, Chip8Vm> {
        lock(&self.vm)
    }

    /// Signal both loops to stop, and wait for the CPU thread.
    ///
    /// Returns the fault that stopped the CPU thread, if any.
    pub fn stop(mut self) -> Chip8Result<()> {
        self.running.store(false, Ordering::Release);
        self.join()
    }

    fn join(&mut self) -> Chip8Result<()> {
        match self.cpu_thread.take().map(JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(_)) => {
                error!("cpu thread panicked");
                Err(Chip8Error::Halted)
            }
            None => Ok(()),
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Err(err) = self.join() {
            debug!("cpu thread ended with: {err}");
        }
    }
}

/// A panic on either thread leaves the machine state intact, so a poisoned lock is recovered.
fn lock(vm: &Mutex<Chip8Vm>) -> MutexGuard<'_, Chip8Vm> {
    vm.lock().unwrap_or_else(PoisonError::into_inner)
}
