use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

use canopy_io::{
    PipelineConfig, Raster, TileBounds, TileIndex, TreeCountRow, parse_file_list, parse_year_list,
    read_geotiff, read_geotiff_window, read_training_tables, write_geotiff,
    write_quality_assessment, write_tree_count_runs, write_tree_count_summary,
    write_variable_importance,
};
use canopy_map::{
    DurationConfig, change_duration, classify_change_types, decadal_change, predict_tile,
    predictor_order,
};
use canopy_rf::{
    CountryExclusion, RandomForest, RandomForestConfig, SpatialHoldout, TrainingSummary,
    TreeCountSearch,
};
use canopy_sample::{ChangeGroup, SamplingLayers, StratifiedSampler, write_samples};

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Tree-canopy-cover sampling, modelling and change mapping")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Training rows dropped besides the held-out district.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExclusionArg {
    /// Rows whose country equals the district name
    DistrictName,
    /// Rows from the district's country
    SameCountry,
    /// Nothing else
    None,
}

impl From<ExclusionArg> for CountryExclusion {
    fn from(arg: ExclusionArg) -> Self {
        match arg {
            ExclusionArg::DistrictName => CountryExclusion::DistrictName,
            ExclusionArg::SameCountry => CountryExclusion::SameCountry,
            ExclusionArg::None => CountryExclusion::None,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Draw stratified training samples for one tile
    Sample {
        /// Path to the YAML configuration
        config: PathBuf,
        /// Tile index in the sampling polygons
        index: usize,
        /// Initial year
        start: String,
        /// Final year
        end: String,
    },

    /// Score a range of tree counts by out-of-bag R²
    SelectTrees {
        /// Path to the YAML configuration
        config: PathBuf,
    },

    /// Fit the final model on every training row
    BuildModel {
        /// Path to the YAML configuration
        config: PathBuf,
        /// Number of trees
        trees: usize,
    },

    /// Validate against one held-out district
    Assess {
        /// Path to the YAML configuration
        config: PathBuf,
        /// Number of trees
        trees: usize,
        /// Index into the sorted district names
        index: usize,
        /// Extra training rows to exclude
        #[arg(long, value_enum, default_value = "district-name")]
        country_exclusion: ExclusionArg,
    },

    /// Map canopy cover and its uncertainty for one tile and year
    Predict {
        /// Path to the YAML configuration
        config: PathBuf,
        /// Tile index in the mapping tiles
        index: usize,
        /// Year substituted into predictor patterns
        year: String,
        /// Temporal gap covariate
        gap: f64,
    },

    /// Classify change over a cover time series
    ChangeTypes {
        /// Path to the YAML configuration
        config: PathBuf,
        /// Comma-separated cover rasters in time order
        files: String,
        /// Significance threshold
        pval: f64,
    },

    /// Years needed to reach most of each pixel's loss or gain
    ChangeDuration {
        /// Path to the YAML configuration
        config: PathBuf,
        /// Comma-separated cover rasters in time order
        files: String,
        /// Change-type raster
        change: PathBuf,
        /// Class code selecting loss pixels
        #[arg(long, default_value_t = 3)]
        loss_code: u8,
        /// Class code selecting gain pixels
        #[arg(long, default_value_t = 4)]
        gain_code: u8,
        /// Cumulative share of the total change
        #[arg(long, default_value_t = 0.8)]
        fraction: f64,
    },

    /// Largest canopy area change per decade for one tile
    DecadalChange {
        /// Path to the YAML configuration
        config: PathBuf,
        /// Tile index in the mapping tiles
        index: usize,
        /// Comma-separated cover rasters in time order
        files: String,
        /// Comma-separated year of each raster
        years: String,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct SampleOutput {
    tile: String,
    target: usize,
    n_changing: usize,
    n_stable: usize,
    output: PathBuf,
}

#[derive(Serialize)]
struct SelectTreesOutput {
    sample_size: usize,
    runs: usize,
    best_n_trees: Option<usize>,
    results: Vec<CandidateOutput>,
}

#[derive(Serialize)]
struct CandidateOutput {
    n_trees: usize,
    oob_r2_mean: f64,
    oob_r2_sd: f64,
}

#[derive(Serialize)]
struct BuildModelOutput {
    #[serde(flatten)]
    summary: TrainingSummary,
    model: PathBuf,
}

#[derive(Serialize)]
struct AssessOutput {
    district: String,
    country: String,
    n_train: usize,
    n_validation: usize,
    rmse: f64,
    r2: f64,
    output: PathBuf,
}

#[derive(Serialize)]
struct PredictOutput {
    tile: String,
    year: String,
    n_predicted: usize,
    prediction: PathBuf,
    uncertainty: PathBuf,
}

#[derive(Serialize)]
struct LayersOutput {
    n_inputs: usize,
    outputs: Vec<PathBuf>,
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::load(path)
        .with_context(|| format!("failed to load configuration {}", path.display()))
}

/// File-name stem of the first input, up to its first dot.
fn series_stem(files: &[PathBuf]) -> Result<String> {
    let first = files.first().context("no input files given")?;
    let name = first
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("input path has no file name: {}", first.display()))?;
    Ok(name.split('.').next().unwrap_or(name).to_string())
}

fn read_series(files: &[PathBuf]) -> Result<Vec<Raster<f32>>> {
    files
        .iter()
        .map(|f| read_geotiff::<f32>(f).with_context(|| format!("failed to read {}", f.display())))
        .collect()
}

fn read_series_window(files: &[PathBuf], bounds: &TileBounds) -> Result<Vec<Raster<f32>>> {
    files
        .iter()
        .map(|f| {
            read_geotiff_window::<f32>(f, bounds, 0.0)
                .with_context(|| format!("failed to read {}", f.display()))
        })
        .collect()
}

fn run_sample(config: &Path, index: usize, start: &str, end: &str, seed: u64) -> Result<()> {
    let config = load_config(config)?;
    let tiles = TileIndex::read(config.country_polygon_path()?)
        .context("failed to read sampling polygons")?;
    let tile = tiles.tile(index)?;
    info!(tile = %tile.id, "sampling tile");

    let land_cover_path = config.resolve_data(&config.predictor_pattern("land_cover")?, start)?;
    let start_path = config.resolve_data(config.canopy_cover_pattern()?, start)?;
    let end_path = config.resolve_data(config.canopy_cover_pattern()?, end)?;
    let gains_path = config.resolve_data(config.forest_gains_pattern()?, start)?;

    let land_mask = read_geotiff_window::<u8>(config.land_mask_path()?, &tile.bounds, 0)
        .context("failed to read land mask")?;
    let land_cover = read_geotiff_window::<i32>(&land_cover_path, &tile.bounds, 0)
        .with_context(|| format!("failed to read {}", land_cover_path.display()))?;
    let start_cover = read_geotiff_window::<f32>(&start_path, &tile.bounds, 0.0)
        .with_context(|| format!("failed to read {}", start_path.display()))?;
    let end_cover = read_geotiff_window::<f32>(&end_path, &tile.bounds, 0.0)
        .with_context(|| format!("failed to read {}", end_path.display()))?;
    let forest_gains = read_geotiff_window::<u8>(&gains_path, &tile.bounds, 0)
        .with_context(|| format!("failed to read {}", gains_path.display()))?;

    let layers = SamplingLayers {
        land_mask: &land_mask,
        land_cover: &land_cover,
        start_cover: &start_cover,
        end_cover: &end_cover,
        forest_gains: &forest_gains,
    };
    let samples = StratifiedSampler::new()
        .with_seed(seed)
        .sample(&layers)
        .with_context(|| format!("sampling failed for tile {}", tile.id))?;

    let output = config.sample_dir()?.join(format!("{}_samples.csv", tile.id));
    write_samples(&output, &samples)?;

    let summary = SampleOutput {
        tile: tile.id,
        target: samples.target,
        n_changing: samples.points_in(ChangeGroup::Changing).count(),
        n_stable: samples.points_in(ChangeGroup::Stable).count(),
        output,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_select_trees(config: &Path, seed: u64) -> Result<()> {
    let config = load_config(config)?;
    let model_dir = config.model_dir()?;
    let (x, y) = read_training_tables(&model_dir).context("failed to read training tables")?;
    let x = x
        .select(&config.feature_columns()?)
        .context("x_data.csv lacks a configured predictor")?;
    let size = config.forest_size()?;

    let search = TreeCountSearch::new(size.min, size.max, size.step_size)?
        .with_runs(size.runs)?
        .with_sample_size(size.samples)
        .with_seed(seed);
    let base = RandomForestConfig::new(size.min)?;
    let result = search
        .run(&base, &x.rows, y.target(), &x.names)
        .context("tree-count search failed")?;

    let summary = result.summary();
    let rows: Vec<TreeCountRow> = summary
        .iter()
        .map(|s| TreeCountRow {
            nr_trees: s.n_trees,
            oob_mean: s.r2_mean,
            oob_sd: s.r2_std,
            mse_mean: s.mse_mean,
            mse_sd: s.mse_std,
        })
        .collect();
    write_tree_count_summary(model_dir.join("nr_trees-summary.csv"), &rows)?;
    write_tree_count_runs(
        model_dir.join("nr_trees-all_runs.csv"),
        result.candidates(),
        result.r2_runs(),
    )?;

    let best = result.smallest_within(0.01);
    info!(best_n_trees = ?best, "tree-count search complete");

    let output = SelectTreesOutput {
        sample_size: result.sample_size(),
        runs: size.runs,
        best_n_trees: best,
        results: summary
            .iter()
            .map(|s| CandidateOutput {
                n_trees: s.n_trees,
                oob_r2_mean: s.r2_mean,
                oob_r2_sd: s.r2_std,
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_build_model(config: &Path, trees: usize, seed: u64) -> Result<()> {
    let config = load_config(config)?;
    let model_dir = config.model_dir()?;
    let (x, y) = read_training_tables(&model_dir).context("failed to read training tables")?;

    let result = RandomForestConfig::new(trees)?
        .with_seed(seed)
        .fit(&x.rows, y.target(), &x.names)
        .context("model training failed")?;

    let importances = result.importances();
    write_variable_importance(
        model_dir.join("variable_importance.csv"),
        importances.names(),
        importances.values(),
    )?;

    let model_path = config.model_path()?;
    result.forest().save(&model_path).context("failed to save model")?;
    info!(path = %model_path.display(), "model saved");

    let output = BuildModelOutput {
        summary: result.summary().clone(),
        model: model_path,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_assess(
    config: &Path,
    trees: usize,
    index: usize,
    exclusion: CountryExclusion,
    seed: u64,
) -> Result<()> {
    let config = load_config(config)?;
    let (x, y) = read_training_tables(&config.model_dir()?)
        .context("failed to read training tables")?;
    let districts = y.column("district")?;
    let countries = y.column("country")?;

    let holdout = SpatialHoldout::from_index(&districts, index)?.with_country_exclusion(exclusion);
    let trainer = RandomForestConfig::new(trees)?.with_seed(seed);
    let result = holdout
        .evaluate(&trainer, &x.rows, y.target(), &districts, &countries, &x.names)
        .with_context(|| format!("hold-out evaluation failed for district {}", holdout.district()))?;
    info!(
        district = %result.district,
        rmse = result.rmse,
        r2 = result.r2,
        "hold-out evaluation complete"
    );

    let output = config
        .quality_dir()?
        .join(format!("{index:04}_quality_assessment.csv"));
    write_quality_assessment(
        &output,
        &y,
        &result.validation_indices,
        &result.predictions,
        &result.confidence,
    )?;

    let summary = AssessOutput {
        district: result.district,
        country: result.country,
        n_train: result.n_train,
        n_validation: result.validation_indices.len(),
        rmse: result.rmse,
        r2: result.r2,
        output,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_predict(config: &Path, index: usize, year: &str, gap: f64) -> Result<()> {
    let config = load_config(config)?;
    let model_path = config.model_path()?;
    let forest = RandomForest::load(&model_path)
        .with_context(|| format!("failed to load model {}", model_path.display()))?;
    info!(n_trees = forest.n_trees(), n_features = forest.n_features(), "model loaded");

    let predictors = config.predictors()?;
    let names: Vec<String> = predictors.iter().map(|p| p.name.clone()).collect();
    let order = predictor_order(forest.feature_names(), &names)
        .context("model does not match the configured predictors")?;

    let tiles = TileIndex::read(config.tiles_path()?).context("failed to read mapping tiles")?;
    let tile = tiles.tile(index)?;
    info!(tile = %tile.id, year, "predicting tile");

    let mask = read_geotiff_window::<u8>(config.mapping_mask_path()?, &tile.bounds, 0)
        .context("failed to read mapping mask")?;
    let layers = order
        .iter()
        .map(|&i| {
            let p = &predictors[i];
            let path = config.resolve(&p.pattern, year);
            read_geotiff_window::<f32>(&path, &tile.bounds, 0.0)
                .with_context(|| format!("failed to read predictor {} at {}", p.name, path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let maps = predict_tile(&forest, &mask, &layers, gap)
        .with_context(|| format!("prediction failed for tile {}", tile.id))?;
    if maps.n_predicted == 0 {
        warn!(tile = %tile.id, "mapping mask has no pixels in this tile");
    }

    let prediction = config
        .canopy_dir()?
        .join(format!("{}_{year}_tcc.tif", tile.id));
    let uncertainty = config
        .uncertainty_dir()?
        .join(format!("{}_{year}_tcc_ci.tif", tile.id));
    write_geotiff(&maps.prediction, &prediction)?;
    write_geotiff(&maps.uncertainty, &uncertainty)?;

    let output = PredictOutput {
        tile: tile.id,
        year: year.to_string(),
        n_predicted: maps.n_predicted,
        prediction,
        uncertainty,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_change_types(config: &Path, files: &str, pval: f64) -> Result<()> {
    let config = load_config(config)?;
    let files = parse_file_list(files);
    let stem = series_stem(&files)?;
    let layers = read_series(&files)?;

    let maps = classify_change_types(&layers, pval).context("change classification failed")?;

    let dir = config.change_dir()?;
    let outputs = vec![
        dir.join(format!("{stem}_changeType.tif")),
        dir.join(format!("{stem}_changeSlope.tif")),
        dir.join(format!("{stem}_changePvalue.tif")),
    ];
    write_geotiff(&maps.class, &outputs[0])?;
    write_geotiff(&maps.slope, &outputs[1])?;
    write_geotiff(&maps.p_value, &outputs[2])?;

    let output = LayersOutput {
        n_inputs: files.len(),
        outputs,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_change_duration(
    config: &Path,
    files: &str,
    change: &Path,
    duration: &DurationConfig,
) -> Result<()> {
    let config = load_config(config)?;
    let files = parse_file_list(files);
    let stem = series_stem(&files)?;
    let layers = read_series(&files)?;
    let change = read_geotiff::<u8>(change)
        .with_context(|| format!("failed to read change classes {}", change.display()))?;

    let maps = change_duration(&layers, &change, duration).context("change duration failed")?;

    let dir = config.change_dir()?;
    let outputs = vec![
        dir.join(format!("{stem}_nrYears80pLoss.tif")),
        dir.join(format!("{stem}_nrYears80pGain.tif")),
    ];
    write_geotiff(&maps.loss, &outputs[0])?;
    write_geotiff(&maps.gain, &outputs[1])?;

    let output = LayersOutput {
        n_inputs: files.len(),
        outputs,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_decadal_change(config: &Path, index: usize, files: &str, years: &str) -> Result<()> {
    let config = load_config(config)?;
    let files = parse_file_list(files);
    let years = parse_year_list(years)?;

    let tiles = TileIndex::read(config.tiles_path()?).context("failed to read mapping tiles")?;
    let tile = tiles.tile(index)?;
    let pixel_area = read_geotiff_window::<f32>(config.pixel_area_path()?, &tile.bounds, 0.0)
        .context("failed to read pixel area")?;
    let layers = read_series_window(&files, &tile.bounds)?;

    let maps = decadal_change(&layers, &years, &pixel_area, &config.decades())
        .with_context(|| format!("decadal change failed for tile {}", tile.id))?;

    let dir = config.change_dir()?;
    let outputs = vec![
        dir.join(format!("{}_maxChange.tif", tile.id)),
        dir.join(format!("{}_maxDecade.tif", tile.id)),
    ];
    write_geotiff(&maps.max_change, &outputs[0])?;
    write_geotiff(&maps.max_decade, &outputs[1])?;

    let output = LayersOutput {
        n_inputs: files.len(),
        outputs,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Sample {
            config,
            index,
            start,
            end,
        } => run_sample(&config, index, &start, &end, cli.seed),
        Command::SelectTrees { config } => run_select_trees(&config, cli.seed),
        Command::BuildModel { config, trees } => run_build_model(&config, trees, cli.seed),
        Command::Assess {
            config,
            trees,
            index,
            country_exclusion,
        } => run_assess(&config, trees, index, country_exclusion.into(), cli.seed),
        Command::Predict {
            config,
            index,
            year,
            gap,
        } => run_predict(&config, index, &year, gap),
        Command::ChangeTypes { config, files, pval } => run_change_types(&config, &files, pval),
        Command::ChangeDuration {
            config,
            files,
            change,
            loss_code,
            gain_code,
            fraction,
        } => {
            let duration = DurationConfig::new()
                .with_loss_code(loss_code)
                .with_gain_code(gain_code)
                .with_fraction(fraction)?;
            run_change_duration(&config, &files, &change, &duration)
        }
        Command::DecadalChange {
            config,
            index,
            files,
            years,
        } => run_decadal_change(&config, index, &files, &years),
    }
}
