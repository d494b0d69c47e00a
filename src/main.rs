use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use camstream::{FileSource, PushClient, PushConfig, Server, ServerConfig, VideoCodec};

#[derive(Parser)]
#[command(
    name = "camstream",
    about = "RTSP streaming server replaying an Annex-B elementary stream"
)]
struct Args {
    /// Annex-B video file to replay (H.264 or HEVC)
    #[arg(long, short)]
    file: PathBuf,

    /// Video codec of the input file
    #[arg(long, value_enum, default_value_t = Codec::H264)]
    codec: Codec,

    /// Replay frame rate
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// RTSP port (successive ports are tried when busy)
    #[arg(long, short, default_value_t = 8554)]
    port: u16,

    /// Require Basic auth with this username
    #[arg(long, requires = "password")]
    username: Option<String>,

    /// Require Basic auth with this password
    #[arg(long, requires = "username")]
    password: Option<String>,

    /// Also push the stream to this remote RTSP URL
    #[arg(long)]
    push_url: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Codec {
    H264,
    H265,
}

impl From<Codec> for VideoCodec {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::H264 => VideoCodec::H264,
            Codec::H265 => VideoCodec::Hevc,
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let codec = VideoCodec::from(args.codec);

    let mut source = match FileSource::open(&args.file, codec, args.fps) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to open {}: {}", args.file.display(), e);
            return;
        }
    };
    if let Err(e) = source.start() {
        eprintln!("Failed to start replay: {}", e);
        return;
    }
    let source = Arc::new(source);

    let config = ServerConfig {
        port: args.port,
        ..ServerConfig::default()
    };
    let mut server = Server::new(config, source.clone(), codec);
    if let (Some(user), Some(pass)) = (&args.username, &args.password) {
        server.update_credentials(user, pass);
    }

    let port = match server.start() {
        Ok(port) => port,
        Err(e) => {
            eprintln!("Failed to start server: {}", e);
            return;
        }
    };

    let mut push = args.push_url.as_deref().map(|url| {
        let mut client = PushClient::new(PushConfig::new(url), source.clone(), codec);
        if let Err(e) = client.start() {
            eprintln!("Failed to start push client: {}", e);
        }
        client
    });

    println!("rtsp://0.0.0.0:{port}/live — press Enter to stop");
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();

    if let Some(client) = push.as_mut() {
        client.stop();
    }
    server.stop();
}
