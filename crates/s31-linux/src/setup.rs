use std::io;
use std::os::unix::io::RawFd;

pub fn is_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) == 1 }
}

fn speed(baud: u32) -> anyhow::Result<libc::speed_t> {
    Ok(match baud {
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        _ => return Err(anyhow::anyhow!("unsupported baud rate {}", baud)),
    })
}

/// Raw mode, 8 data bits, even parity, one stop bit, no flow control.
pub fn configure_tty(fd: RawFd, baud: u32) -> anyhow::Result<()> {
    let speed = speed(baud)?;
    unsafe {
        let mut tio: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(io::Error::last_os_error().into());
        }
        libc::cfmakeraw(&mut tio);
        tio.c_cflag &= !(libc::CSIZE | libc::PARODD | libc::CSTOPB | libc::CRTSCTS);
        tio.c_cflag |= libc::CS8 | libc::PARENB | libc::CLOCAL | libc::CREAD;
        tio.c_iflag |= libc::INPCK;
        libc::cfsetispeed(&mut tio, speed);
        libc::cfsetospeed(&mut tio, speed);
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(io::Error::last_os_error().into());
        }
    }
    Ok(())
}
