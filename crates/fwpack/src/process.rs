// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Run external tools and stream their output

use std::{
    io::{self, BufRead},
    process, thread,
};

/// Run `command` to completion, passing each stdout line to `on_line`
///
/// stderr is drained on a helper thread and forwarded to the log so a
/// chatty tool can't block on a full pipe. Output need not be UTF-8, lines
/// are decoded lossily. The child is always waited for, even when reading
/// its output fails.
pub fn run(command: &mut process::Command, mut on_line: impl FnMut(&str)) -> Result<process::ExitStatus, io::Error> {
    let mut child = command
        .stdin(process::Stdio::null())
        .stdout(process::Stdio::piped())
        .stderr(process::Stdio::piped())
        .spawn()?;

    let stderr_log = child.stderr.take().map(log_stderr);

    // Dropping stdout on error closes the pipe so the child can't stall on it
    let streamed: Result<(), io::Error> = child.stdout.take().map_or(Ok(()), |stdout| {
        lines(stdout).try_for_each(|line| {
            on_line(&line?);
            Ok(())
        })
    });

    let status = child.wait();

    if let Some(handle) = stderr_log {
        let _ = handle.join();
    }

    streamed?;
    status
}

/// Render `command` roughly as a shell would show it
pub fn display(command: &process::Command) -> String {
    let program = command.get_program().to_string_lossy();
    let args = command.get_args().map(|arg| arg.to_string_lossy());

    std::iter::once(program)
        .chain(args)
        .collect::<Vec<_>>()
        .join(" ")
}

fn log_stderr<R>(pipe: R) -> thread::JoinHandle<()>
where
    R: io::Read + Send + 'static,
{
    thread::spawn(move || {
        for line in lines(pipe).map_while(Result::ok) {
            log::warn!("{line}");
        }
    })
}

/// Newline separated lines of `pipe`, invalid UTF-8 replaced
fn lines<R: io::Read>(pipe: R) -> impl Iterator<Item = Result<String, io::Error>> {
    io::BufReader::new(pipe).split(b'\n').map(|line| {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    })
}
