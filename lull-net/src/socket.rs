//! ## lull-net::socket
//! **Non-blocking TCP and socket-pair plumbing**
//!
//! Thin wrappers over the BSD socket calls. Descriptors are returned as
//! [`OwnedFd`], so closing is just dropping them.

use std::io;
use std::mem;
use std::net::Ipv4Addr;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd, RawFd};

use tracing::debug;

/// Outcome of a connect attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connect {
    Connected,
    /// Non-blocking connect still running; wait for writable.
    InProgress,
}

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn raw(fd: &impl AsFd) -> RawFd {
    fd.as_fd().as_raw_fd()
}

/// IPv4 TCP socket.
pub fn tcp_socket(non_blocking: bool) -> io::Result<OwnedFd> {
    // SAFETY: no pointers are passed.
    let fd = cvt(unsafe {
        libc::socket(
            libc::AF_INET,
            libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
            libc::IPPROTO_TCP,
        )
    })?;
    // SAFETY: fd was just returned by socket(2) and nothing else owns it.
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };
    set_non_blocking(&fd, non_blocking)?;
    debug!(fd = fd.as_raw_fd(), non_blocking, "created tcp socket");
    Ok(fd)
}

/// Connected pair of AF_UNIX stream sockets.
pub fn socket_pair(non_blocking: bool) -> io::Result<(OwnedFd, OwnedFd)> {
    let mut sv = [0 as libc::c_int; 2];
    // SAFETY: sv has room for the two descriptors socketpair(2) writes.
    cvt(unsafe {
        libc::socketpair(
            libc::AF_UNIX,
            libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
            0,
            sv.as_mut_ptr(),
        )
    })?;
    // SAFETY: both descriptors are fresh and owned by nobody else.
    let (a, b) = unsafe { (OwnedFd::from_raw_fd(sv[0]), OwnedFd::from_raw_fd(sv[1])) };
    set_non_blocking(&a, non_blocking)?;
    set_non_blocking(&b, non_blocking)?;
    Ok((a, b))
}

pub fn set_non_blocking(fd: impl AsFd, non_blocking: bool) -> io::Result<()> {
    let fd = raw(&fd);
    // SAFETY: fcntl on a borrowed, open descriptor.
    let flags = cvt(unsafe { libc::fcntl(fd, libc::F_GETFL) })?;
    let flags = if non_blocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    // SAFETY: as above.
    cvt(unsafe { libc::fcntl(fd, libc::F_SETFL, flags) })?;
    Ok(())
}

pub fn is_non_blocking(fd: impl AsFd) -> io::Result<bool> {
    // SAFETY: fcntl on a borrowed, open descriptor.
    let flags = cvt(unsafe { libc::fcntl(raw(&fd), libc::F_GETFL) })?;
    Ok(flags & libc::O_NONBLOCK != 0)
}

fn sockaddr_v4(ip: Ipv4Addr, port: u16) -> libc::sockaddr_in {
    // SAFETY: sockaddr_in is plain data and all-zero is a valid value.
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    addr.sin_family = libc::AF_INET as libc::sa_family_t;
    addr.sin_port = port.to_be();
    addr.sin_addr = libc::in_addr {
        s_addr: u32::from(ip).to_be(),
    };
    addr
}

/// Starts a connection to `ip:port`.
///
/// On a non-blocking socket this usually returns [`Connect::InProgress`];
/// poll for writable, then check [`socket_status`].
pub fn connect(fd: impl AsFd, ip: &str, port: u16) -> io::Result<Connect> {
    let ip: Ipv4Addr = ip.parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid IPv4 address '{ip}'"),
        )
    })?;
    let addr = sockaddr_v4(ip, port);
    // SAFETY: addr lives across the call and the length matches its type.
    let ret = unsafe {
        libc::connect(
            raw(&fd),
            (&addr as *const libc::sockaddr_in).cast::<libc::sockaddr>(),
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if ret == 0 {
        return Ok(Connect::Connected);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EINPROGRESS) {
        Ok(Connect::InProgress)
    } else {
        Err(err)
    }
}

/// Reads `SO_ERROR` to learn how a pending connect ended.
pub fn socket_status(fd: impl AsFd) -> io::Result<Connect> {
    let mut optval: libc::c_int = 0;
    let mut optlen = mem::size_of::<libc::c_int>() as libc::socklen_t;
    // SAFETY: optval/optlen describe a writable c_int.
    cvt(unsafe {
        libc::getsockopt(
            raw(&fd),
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            (&mut optval as *mut libc::c_int).cast::<libc::c_void>(),
            &mut optlen,
        )
    })?;
    match optval {
        0 => Ok(Connect::Connected),
        libc::EINPROGRESS => Ok(Connect::InProgress),
        errno => Err(io::Error::from_raw_os_error(errno)),
    }
}

/// Binds `INADDR_ANY:port` with `SO_REUSEADDR` and starts listening.
pub fn listen(fd: impl AsFd, port: u16, backlog: i32) -> io::Result<()> {
    let fd = raw(&fd);
    let opt: libc::c_int = 1;
    // SAFETY: opt is a live c_int and the length matches.
    cvt(unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            (&opt as *const libc::c_int).cast::<libc::c_void>(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    })?;
    let addr = sockaddr_v4(Ipv4Addr::UNSPECIFIED, port);
    // SAFETY: addr lives across the call and the length matches its type.
    cvt(unsafe {
        libc::bind(
            fd,
            (&addr as *const libc::sockaddr_in).cast::<libc::sockaddr>(),
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    })?;
    // SAFETY: no pointers are passed.
    cvt(unsafe { libc::listen(fd, backlog) })?;
    debug!(fd, port, backlog, "listening");
    Ok(())
}

/// Port a bound IPv4 socket ended up on, useful after binding port 0.
pub fn local_port(fd: impl AsFd) -> io::Result<u16> {
    // SAFETY: sockaddr_in is plain data and all-zero is a valid value.
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    // SAFETY: addr/len describe a writable sockaddr_in.
    cvt(unsafe {
        libc::getsockname(
            raw(&fd),
            (&mut addr as *mut libc::sockaddr_in).cast::<libc::sockaddr>(),
            &mut len,
        )
    })?;
    Ok(u16::from_be(addr.sin_port))
}

pub fn send(fd: impl AsFd, buf: &[u8], flags: i32) -> io::Result<usize> {
    // SAFETY: buf is a live slice and its length is passed alongside.
    let ret = unsafe { libc::send(raw(&fd), buf.as_ptr().cast::<libc::c_void>(), buf.len(), flags) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

pub fn recv(fd: impl AsFd, buf: &mut [u8], flags: i32) -> io::Result<usize> {
    // SAFETY: buf is a live mutable slice and its length is passed alongside.
    let ret = unsafe {
        libc::recv(
            raw(&fd),
            buf.as_mut_ptr().cast::<libc::c_void>(),
            buf.len(),
            flags,
        )
    };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}
