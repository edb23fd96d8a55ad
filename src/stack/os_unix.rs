use super::{PageSize, StackProbe};
use crate::error::Error;
use crate::publish::Address;
use libc::{c_int, pthread_attr_t};
use std::io;
use std::mem::MaybeUninit;

/// Asks pthreads and the kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsProbe;

impl StackProbe for OsProbe {
  fn stack_size(&self) -> Result<usize, Error> { thread_stack_size() }

  fn guard_size(&self) -> Result<usize, Error> {
    // Fresh default attributes, not the running thread's.
    let mut attr = MaybeUninit::<pthread_attr_t>::uninit();
    check("pthread_attr_init", unsafe { libc::pthread_attr_init(attr.as_mut_ptr()) })?;
    let mut guard = 0usize;
    let res = unsafe { libc::pthread_attr_getguardsize(attr.as_ptr(), &mut guard) };
    unsafe { libc::pthread_attr_destroy(attr.as_mut_ptr()) };
    check("pthread_attr_getguardsize", res)?;
    Ok(guard)
  }

  fn stack_limit(&self) -> Result<Option<usize>, Error> {
    let mut rlim = libc::rlimit { rlim_cur: 0, rlim_max: 0 };
    if unsafe { libc::getrlimit(libc::RLIMIT_STACK, &mut rlim) } != 0 {
      return Err(Error::ProbeFailed { query: "getrlimit", source: io::Error::last_os_error() });
    }
    match rlim.rlim_cur {
      libc::RLIM_INFINITY => Ok(None),
      cur => Ok(Some(cur as usize)),
    }
  }

  fn page_size(&self) -> Result<PageSize, Error> {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
      -1 => Err(Error::ProbeFailed { query: "sysconf(_SC_PAGESIZE)", source: io::Error::last_os_error() }),
      size => Ok(PageSize::new(size as usize)),
    }
  }
}

/// Where the process environment array lives. On most systems the kernel
/// put it just above `main`'s frame.
#[cfg(not(any(target_os="macos", target_os="ios")))]
pub fn environment() -> Option<Address> {
  extern "C" {
    static environ: *const *const libc::c_char;
  }
  let env = unsafe { environ };
  (!env.is_null()).then(|| Address::of(env))
}

#[cfg(any(target_os="macos", target_os="ios"))]
pub fn environment() -> Option<Address> { None }

/// pthread functions hand back the error number instead of setting errno.
fn check(query: &'static str, code: c_int) -> Result<(), Error> {
  match code {
    0 => Ok(()),
    code => Err(Error::probe(query, code)),
  }
}

#[cfg(any(target_os="linux", target_os="android", target_os="netbsd"))]
fn thread_stack_size() -> Result<usize, Error> {
  let mut attr = MaybeUninit::<pthread_attr_t>::uninit();
  check("pthread_getattr_np", unsafe { libc::pthread_getattr_np(libc::pthread_self(), attr.as_mut_ptr()) })?;
  attr_stack_size(attr)
}

#[cfg(target_os="freebsd")]
fn thread_stack_size() -> Result<usize, Error> {
  // FreeBSD wants the attributes initialised before it fills them in.
  let mut attr = MaybeUninit::<pthread_attr_t>::uninit();
  check("pthread_attr_init", unsafe { libc::pthread_attr_init(attr.as_mut_ptr()) })?;
  let res = unsafe { libc::pthread_attr_get_np(libc::pthread_self(), attr.as_mut_ptr()) };
  if res != 0 {
    unsafe { libc::pthread_attr_destroy(attr.as_mut_ptr()) };
    return Err(Error::probe("pthread_attr_get_np", res));
  }
  attr_stack_size(attr)
}

#[cfg(any(target_os="linux", target_os="android", target_os="netbsd", target_os="freebsd"))]
fn attr_stack_size(mut attr: MaybeUninit<pthread_attr_t>) -> Result<usize, Error> {
  let mut size = 0usize;
  let res = unsafe { libc::pthread_attr_getstacksize(attr.as_ptr(), &mut size) };
  unsafe { libc::pthread_attr_destroy(attr.as_mut_ptr()) };
  check("pthread_attr_getstacksize", res)?;
  Ok(size)
}

#[cfg(any(target_os="macos", target_os="ios"))]
fn thread_stack_size() -> Result<usize, Error> {
  match unsafe { libc::pthread_get_stacksize_np(libc::pthread_self()) } {
    0 => Err(Error::ProbeFailed {
      query: "pthread_get_stacksize_np",
      source: io::Error::new(io::ErrorKind::Other, "reported an empty stack"),
    }),
    size => Ok(size),
  }
}

#[cfg(target_os="openbsd")]
fn thread_stack_size() -> Result<usize, Error> {
  let mut seg = MaybeUninit::<libc::stack_t>::uninit();
  check("pthread_stackseg_np", unsafe { libc::pthread_stackseg_np(libc::pthread_self(), seg.as_mut_ptr()) })?;
  Ok(unsafe { seg.assume_init() }.ss_size)
}

#[cfg(not(any(
  target_os="linux", target_os="android", target_os="netbsd", target_os="freebsd",
  target_os="macos", target_os="ios", target_os="openbsd"
)))]
fn thread_stack_size() -> Result<usize, Error> {
  Err(Error::UnsupportedPlatform("thread stack size"))
}
