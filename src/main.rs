#[cfg(not(feature = "demo"))]
fn main() {
    eprintln!(
        "The emu-host demo requires the \"demo\" feature. Rebuild with `--features demo` to run it."
    );
}

#[cfg(feature = "demo")]
fn main() -> anyhow::Result<()> {
    demo::run()
}

#[cfg(feature = "demo")]
mod demo {
    use std::env;
    use std::io::{self, Write};
    use std::path::{Path, PathBuf};
    use std::sync::{mpsc, Arc};
    use std::time::{Duration, Instant};

    use anyhow::{bail, Context};
    use emu_host::{
        console_eprint, console_print, ConsoleDest, EmuContext, EmuThread, EmulatorCore,
        HostConfig, HostEvent, LinkStatus, LoadRequest, LoadStatus, SaveKind,
    };
    use tracing_subscriber::EnvFilter;

    /// Parsed command-line arguments.
    #[derive(Debug)]
    struct DemoArgs {
        speed: u32,
        throttle: bool,
        seconds: u64,
        config: Option<PathBuf>,
        show_help: bool,
    }

    impl Default for DemoArgs {
        fn default() -> Self {
            Self {
                speed: 100,
                throttle: true,
                seconds: 3,
                config: None,
                show_help: false,
            }
        }
    }

    impl DemoArgs {
        fn parse() -> anyhow::Result<Self> {
            let mut args = Self::default();
            let mut iter = env::args().skip(1);

            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--speed" => {
                        let value = iter.next().context("--speed needs a value")?;
                        args.speed = value
                            .parse()
                            .with_context(|| format!("invalid speed '{value}'"))?;
                    }
                    "--seconds" => {
                        let value = iter.next().context("--seconds needs a value")?;
                        args.seconds = value
                            .parse()
                            .with_context(|| format!("invalid duration '{value}'"))?;
                    }
                    "--config" => {
                        args.config = Some(iter.next().context("--config needs a path")?.into());
                    }
                    "--no-throttle" => args.throttle = false,
                    "--help" | "-h" => args.show_help = true,
                    other => bail!("unknown argument '{other}'"),
                }
            }

            Ok(args)
        }

        fn print_help() {
            println!("emu-host-demo - run a toy core through the emulation host");
            println!();
            println!("USAGE:");
            println!("    emu-host-demo [--speed N] [--no-throttle] [--seconds S] [--config FILE]");
            println!();
            println!("OPTIONS:");
            println!("    --speed N        Emulation speed percent (default 100, 0 pauses)");
            println!("    --no-throttle    Run as fast as possible");
            println!("    --seconds S      How long to run (default 3)");
            println!("    --config FILE    JSON host configuration");
            println!("    -h, --help       Show this help");
        }
    }

    /// Frame counter standing in for a real emulator.
    struct ToyCore {
        frame: u64,
    }

    impl EmulatorCore for ToyCore {
        fn run(&mut self, ctx: &EmuContext) {
            console_print!(ctx, "toy core running\n");
            while !ctx.should_exit() {
                self.frame += 1;
                if self.frame % 60 == 0 {
                    console_print!(ctx, "frame {}\n", self.frame);
                }
                ctx.checkpoint(self);
                ctx.throttle_wait();
            }
            console_eprint!(ctx, "toy core stopped at frame {}\n", self.frame);
        }

        fn reset(&mut self) {
            self.frame = 0;
        }

        fn save_state(&mut self, _kind: SaveKind, path: &Path) -> bool {
            std::fs::write(path, self.frame.to_le_bytes()).is_ok()
        }

        fn load(&mut self, request: &LoadRequest) -> LoadStatus {
            match std::fs::read(request.path()) {
                Ok(bytes) => match <[u8; 8]>::try_from(bytes.as_slice()) {
                    Ok(raw) => {
                        self.frame = u64::from_le_bytes(raw);
                        LoadStatus::Okay
                    }
                    Err(_) => LoadStatus::NotAnImage,
                },
                Err(_) => LoadStatus::Fail,
            }
        }

        fn send_variable(&mut self, file: &Path, _location: u32) -> LinkStatus {
            if file.exists() {
                LinkStatus::Good
            } else {
                LinkStatus::Error
            }
        }
    }

    pub fn run() -> anyhow::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();

        let args = DemoArgs::parse()?;
        if args.show_help {
            DemoArgs::print_help();
            return Ok(());
        }

        let config = match &args.config {
            Some(path) => HostConfig::from_path(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => HostConfig::default(),
        };

        let (tx, rx) = mpsc::channel::<HostEvent>();
        let mut emu = EmuThread::new(ToyCore { frame: 0 }, &config, Arc::new(tx))?;
        emu.host().set_speed(args.speed);
        emu.host().set_throttle_mode(args.throttle);
        emu.start()?;

        let deadline = Instant::now() + Duration::from_secs(args.seconds);
        let stdout = io::stdout();
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(remaining) {
                Ok(HostEvent::ConsoleReady(dest)) => {
                    if let Some(bytes) = emu.host().console().try_read() {
                        let text = String::from_utf8_lossy(&bytes);
                        match dest {
                            ConsoleDest::Normal => print!("{text}"),
                            ConsoleDest::Error => eprint!("{text}"),
                        }
                    }
                }
                Ok(HostEvent::ActualSpeedChanged(speed)) => {
                    println!("[speed {speed}%]");
                }
                Ok(HostEvent::Stopped) => break,
                Ok(_) => {}
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
            stdout.lock().flush()?;
        }

        if !emu.request_stop() {
            bail!("emulation thread could not be stopped");
        }
        while let Some(bytes) = emu.host().console().try_read() {
            print!("{}", String::from_utf8_lossy(&bytes));
        }
        println!("state: {:?}", emu.state());
        Ok(())
    }
}
