//! Host import stubs for the emscripten-built guest.
//!
//! The guest links against an `env` import surface it never gets for real:
//! the module runs single-threaded and fully sandboxed, so every threading
//! primitive is an explicit named no-op returning immediate success, memory
//! growth is refused outright (the memory size is fixed at construction
//! time), and syscalls trap. The only stubs with real behavior are the bulk
//! memory copy and the errno sink.
//!
//! Thread-stub invocations are counted in the host state so tests can
//! assert the guest never exercises them for real concurrency.

use thiserror::Error;
use wasmtime::{Caller, Linker, Memory};

use crate::config::GuestLayout;
use crate::error::{BridgeError, Result};
use crate::loader::HostState;

/// Trap payload raised when the guest requests a refused capability.
///
/// Travels through wasmtime as the root cause of the failed guest call and
/// is recovered by downcasting, so callers can tell "the codec is broken"
/// apart from "the codec wants something this bridge does not provide".
#[derive(Debug, Clone, Copy, Error)]
#[error("unsupported guest capability: {0}")]
pub struct Unsupported(pub &'static str);

fn refuse<T>(what: &'static str) -> std::result::Result<T, wasmtime::Error> {
    Err(wasmtime::Error::new(Unsupported(what)))
}

fn register_failed(name: &str, e: wasmtime::Error) -> BridgeError {
    BridgeError::Instantiate(format!("failed to register {name}: {e}"))
}

/// Register the full `env` stub surface with the linker.
///
/// `memory` is the host-created linear memory the guest will import; the
/// copy and errno stubs capture it directly since the guest has no other
/// memory.
pub(crate) fn register(
    linker: &mut Linker<HostState>,
    memory: Memory,
    layout: &GuestLayout,
) -> Result<()> {
    let errno_ptr = layout.errno_ptr as usize;

    // Bulk copy within linear memory. Overlapping ranges get memmove
    // semantics via copy_within.
    linker
        .func_wrap(
            "env",
            "_emscripten_memcpy_big",
            move |mut caller: Caller<'_, HostState>, dest: u32, src: u32, num: u32| {
                let data = memory.data_mut(&mut caller);
                let (dest, src, num) = (dest as usize, src as usize, num as usize);
                if src.saturating_add(num) > data.len() || dest.saturating_add(num) > data.len() {
                    return Err(wasmtime::Error::msg("bulk copy out of bounds"));
                }
                data.copy_within(src..src + num, dest);
                Ok(())
            },
        )
        .map_err(|e| register_failed("_emscripten_memcpy_big", e))?;

    linker
        .func_wrap("env", "_emscripten_get_heap_size", {
            move |caller: Caller<'_, HostState>| memory.data_size(&caller) as u32
        })
        .map_err(|e| register_failed("_emscripten_get_heap_size", e))?;

    // Growth is refused: the memory size is a build constant of the guest.
    linker
        .func_wrap(
            "env",
            "_emscripten_resize_heap",
            |_: Caller<'_, HostState>, _requested: u32| refuse::<u32>("memory growth"),
        )
        .map_err(|e| register_failed("_emscripten_resize_heap", e))?;
    linker
        .func_wrap(
            "env",
            "abortOnCannotGrowMemory",
            |_: Caller<'_, HostState>, _requested: u32| refuse::<u32>("memory growth"),
        )
        .map_err(|e| register_failed("abortOnCannotGrowMemory", e))?;

    // Errno sink: the guest signals internal errors by number, stored at
    // the fixed slot its libc expects.
    linker
        .func_wrap(
            "env",
            "___setErrNo",
            move |mut caller: Caller<'_, HostState>, value: u32| {
                let data = memory.data_mut(&mut caller);
                if errno_ptr + 4 > data.len() {
                    return Err(wasmtime::Error::msg("errno slot outside memory"));
                }
                data[errno_ptr..errno_ptr + 4].copy_from_slice(&value.to_le_bytes());
                Ok(())
            },
        )
        .map_err(|e| register_failed("___setErrNo", e))?;

    register_thread_stubs(linker)?;
    register_traps(linker)?;

    Ok(())
}

/// Cooperative threading no-ops. The guest is built single-threaded, so
/// every primitive "succeeds immediately" with 0. Each call is counted.
fn register_thread_stubs(linker: &mut Linker<HostState>) -> Result<()> {
    fn noop(caller: &mut Caller<'_, HostState>) -> i32 {
        caller.data_mut().thread_stub_calls += 1;
        0
    }

    let unary = [
        "_pthread_cond_signal",
        "_pthread_cond_destroy",
        "_pthread_cond_broadcast",
        "_pthread_attr_init",
        "_pthread_attr_destroy",
    ];
    for name in unary {
        linker
            .func_wrap("env", name, |mut caller: Caller<'_, HostState>, _: u32| {
                noop(&mut caller)
            })
            .map_err(|e| register_failed(name, e))?;
    }

    let binary = [
        "_pthread_cond_wait",
        "_pthread_cond_init",
        "_pthread_join",
        "_pthread_attr_setstacksize",
    ];
    for name in binary {
        linker
            .func_wrap(
                "env",
                name,
                |mut caller: Caller<'_, HostState>, _: u32, _: u32| noop(&mut caller),
            )
            .map_err(|e| register_failed(name, e))?;
    }

    linker
        .func_wrap(
            "env",
            "_pthread_create",
            |mut caller: Caller<'_, HostState>, _: u32, _: u32, _: u32, _: u32| {
                noop(&mut caller)
            },
        )
        .map_err(|e| register_failed("_pthread_create", e))?;

    Ok(())
}

/// Aborts and syscall traps: fail fast with a diagnostic naming the
/// capability, never emulate.
fn register_traps(linker: &mut Linker<HostState>) -> Result<()> {
    linker
        .func_wrap("env", "_abort", |_: Caller<'_, HostState>| {
            refuse::<()>("abort")
        })
        .map_err(|e| register_failed("_abort", e))?;
    linker
        .func_wrap("env", "abort", |_: Caller<'_, HostState>, _code: u32| {
            refuse::<()>("abort")
        })
        .map_err(|e| register_failed("abort", e))?;

    let syscalls = [
        ("___syscall6", "syscall 6 (close)"),
        ("___syscall140", "syscall 140 (llseek)"),
        ("___syscall146", "syscall 146 (writev)"),
    ];
    for (name, what) in syscalls {
        linker
            .func_wrap(
                "env",
                name,
                move |_: Caller<'_, HostState>, _which: u32, _varargs: u32| {
                    refuse::<i32>(what)
                },
            )
            .map_err(|e| register_failed(name, e))?;
    }

    Ok(())
}
