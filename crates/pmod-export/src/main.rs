use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    fs::{self, File},
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
    process::ExitCode,
};

use log::{error, info};
use pmod_asset::{
    encoder::{ArmaturePolicy, EncodeError, EncodeOptions, QuaternionOrder},
    encode_with_options,
    loader::{
        gltf::{self, GltfLoadError},
        obj::{self, ObjLoadError},
        LoadParams,
    },
    scene::Scene,
};

const USAGE: &str =
    "Usage: pmod-export <input.gltf|glb|obj|json> [output.pmod] [--w-last] [--first-armature] [--no-flip-v]";

#[derive(Debug)]
enum ExportError {
    Usage(String),
    UnknownFormat(PathBuf),
    Io(io::Error),
    Gltf(GltfLoadError),
    Obj(ObjLoadError),
    Json(serde_json::Error),
    Encode(EncodeError),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Usage(message) => write!(f, "{}\n{}", message, USAGE),
            ExportError::UnknownFormat(path) => {
                write!(f, "Unknown input format: {}", path.display())
            }
            ExportError::Io(error) => Display::fmt(error, f),
            ExportError::Gltf(error) => Display::fmt(error, f),
            ExportError::Obj(error) => Display::fmt(error, f),
            ExportError::Json(error) => Display::fmt(error, f),
            ExportError::Encode(error) => Display::fmt(error, f),
        }
    }
}

impl Error for ExportError {}

impl From<io::Error> for ExportError {
    fn from(value: io::Error) -> Self {
        ExportError::Io(value)
    }
}

impl From<EncodeError> for ExportError {
    fn from(value: EncodeError) -> Self {
        ExportError::Encode(value)
    }
}

#[derive(Debug)]
struct Args {
    input: PathBuf,
    output: PathBuf,
    options: EncodeOptions,
    params: LoadParams,
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self, ExportError> {
        let mut options = EncodeOptions::default();
        let mut params = LoadParams::default();
        let mut paths = Vec::new();
        for arg in args {
            match arg.as_str() {
                "--w-last" => options.quaternion_order = QuaternionOrder::WLast,
                "--first-armature" => options.armature_policy = ArmaturePolicy::FirstFound,
                "--no-flip-v" => params.flip_v = false,
                flag if flag.starts_with("--") => {
                    return Err(ExportError::Usage(format!("Unknown option {}", flag)))
                }
                path => paths.push(PathBuf::from(path)),
            }
        }
        let mut paths = paths.into_iter();
        let input = paths
            .next()
            .ok_or_else(|| ExportError::Usage(String::from("Missing input file")))?;
        let output = paths
            .next()
            .unwrap_or_else(|| input.with_extension("pmod"));
        if paths.next().is_some() {
            return Err(ExportError::Usage(String::from("Too many arguments")));
        }
        Ok(Self {
            input,
            output,
            options,
            params,
        })
    }
}

fn load_scene(path: &Path, params: &LoadParams) -> Result<Scene, ExportError> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("gltf" | "glb" | "vrm") => gltf::load_gltf(path, params).map_err(ExportError::Gltf),
        Some("obj") => obj::load_obj(path).map_err(ExportError::Obj),
        Some("json") => {
            let reader = BufReader::new(File::open(path)?);
            serde_json::from_reader(reader).map_err(ExportError::Json)
        }
        _ => Err(ExportError::UnknownFormat(path.to_path_buf())),
    }
}

fn export(args: &Args) -> Result<(), ExportError> {
    info!("Loading {}", args.input.display());
    let scene = load_scene(&args.input, &args.params)?;
    info!(
        "Loaded {} objects, {} nodes",
        scene.objects.len(),
        scene.nodes().count()
    );

    let file = File::create(&args.output)?;
    if let Err(err) = encode_with_options(&scene, BufWriter::new(file), &args.options) {
        // A partial PMOD file cannot be read back.
        let _ = fs::remove_file(&args.output);
        return Err(err.into());
    }
    info!("Wrote {}", args.output.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let result = Args::parse(std::env::args().skip(1)).and_then(|args| export(&args));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use pmod_asset::encoder::{ArmaturePolicy, QuaternionOrder};

    use super::{Args, ExportError};

    fn parse(args: &[&str]) -> Result<Args, ExportError> {
        Args::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn test_default_output() {
        let args = parse(&["models/cube.glb"]).unwrap();
        assert_eq!(args.output, PathBuf::from("models/cube.pmod"));
        assert_eq!(args.options.quaternion_order, QuaternionOrder::WFirst);
        assert_eq!(args.options.armature_policy, ArmaturePolicy::Reject);
        assert!(args.params.flip_v);
    }

    #[test]
    fn test_flags() {
        let args = parse(&["in.obj", "--w-last", "out.pmod", "--first-armature", "--no-flip-v"])
            .unwrap();
        assert_eq!(args.input, PathBuf::from("in.obj"));
        assert_eq!(args.output, PathBuf::from("out.pmod"));
        assert_eq!(args.options.quaternion_order, QuaternionOrder::WLast);
        assert_eq!(args.options.armature_policy, ArmaturePolicy::FirstFound);
        assert!(!args.params.flip_v);
    }

    #[test]
    fn test_bad_arguments() {
        assert!(matches!(parse(&[]), Err(ExportError::Usage(_))));
        assert!(matches!(parse(&["a", "b", "c"]), Err(ExportError::Usage(_))));
        assert!(matches!(parse(&["a", "--verbose"]), Err(ExportError::Usage(_))));
    }
}
