//! Materializes a scraped issue as an EPUB tree, archives it and hands the
//! archive to the device converter.

use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use press_core::{Issue, MediaType};
use thiserror::Error;

use crate::archive::{archive_dir, ArchiveError};
use crate::convert::{ConversionError, FormatConverter};
use crate::fetch::{ProgressSink, ResourceKind, Session};
use crate::persist::{ensure_output_dir, reset_dir, AtomicFileWriter, PersistError};
use crate::templates::{
    render_article, render_container_xml, render_content_opf, render_toc_html, render_toc_ncx,
    PackageContents, STYLE_CSS,
};
use crate::transcode::{normalize, ImageNormalization};
use crate::{PipelineEvent, Progress, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageConfig {
    /// Where `<issue id>.epub` (and the converted file) end up.
    pub issues_dir: PathBuf,
    /// Parent of the per-issue working trees.
    pub tmp_dir: PathBuf,
    pub language: String,
    pub normalization: ImageNormalization,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            issues_dir: PathBuf::from("issues"),
            tmp_dir: PathBuf::from("tmp"),
            language: "en".to_string(),
            normalization: ImageNormalization::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("cannot prepare {path}: {source}")]
    Layout { path: PathBuf, source: PersistError },
    #[error("cannot write {file}: {source}")]
    Render { file: String, source: PersistError },
    #[error("cannot archive: {0}")]
    Archive(#[from] ArchiveError),
}

/// Directories of one issue's working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLayout {
    pub workdir: PathBuf,
    pub meta_inf: PathBuf,
    pub oebps: PathBuf,
    pub images: PathBuf,
}

impl PackageLayout {
    pub fn new(tmp_dir: &Path, issue_id: &str) -> Self {
        let workdir = tmp_dir.join(issue_id);
        let oebps = workdir.join("OEBPS");
        Self {
            meta_inf: workdir.join("META-INF"),
            images: oebps.join("images"),
            oebps,
            workdir,
        }
    }
}

pub struct PackageWriter {
    config: PackageConfig,
    converter: Option<Box<dyn FormatConverter>>,
}

impl PackageWriter {
    pub fn new(config: PackageConfig) -> Self {
        Self {
            config,
            converter: None,
        }
    }

    pub fn with_converter(mut self, converter: Box<dyn FormatConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    pub fn layout(&self, issue: &Issue) -> PackageLayout {
        PackageLayout::new(&self.config.tmp_dir, issue.id())
    }

    pub fn archive_path(&self, issue: &Issue) -> PathBuf {
        self.config.issues_dir.join(format!("{}.epub", issue.id()))
    }

    /// Wipes and recreates the issue's working tree.
    pub fn prepare_layout(&self, issue: &Issue) -> Result<PackageLayout, PackageError> {
        let layout = self.layout(issue);
        let fail = |path: &PathBuf| {
            let path = path.clone();
            move |source| PackageError::Layout { path, source }
        };
        reset_dir(&layout.workdir).map_err(fail(&layout.workdir))?;
        for dir in [&layout.meta_inf, &layout.oebps, &layout.images] {
            ensure_output_dir(dir).map_err(fail(dir))?;
        }
        Ok(layout)
    }

    /// Downloads and normalizes every image of the issue. Returns the relative
    /// paths that were written; failures are reported and skipped.
    pub async fn materialize_images(
        &self,
        issue: &Issue,
        layout: &PackageLayout,
        session: &dyn Session,
        sink: &dyn ProgressSink,
    ) -> Vec<String> {
        let writer = AtomicFileWriter::new(layout.oebps.clone());
        let images = issue.images();
        let total = images.len();
        engine_info!("Downloading and processing {} images", total);

        let mut written = Vec::new();
        for (done, image) in images.into_iter().enumerate() {
            let outcome = if image.media_type() == MediaType::Unknown {
                Err(format!("unknown media type for {}", image.name()))
            } else {
                match session.fetch(image.source().as_str(), ResourceKind::Image).await {
                    Ok(output) => normalize(&output.bytes, image.media_type(), &self.config.normalization)
                        .map_err(|e| e.to_string())
                        .and_then(|bytes| {
                            writer
                                .write(image.rel_path(), bytes)
                                .map_err(|e| e.to_string())
                        }),
                    Err(err) => Err(err.to_string()),
                }
            };
            match outcome {
                Ok(_) => written.push(image.rel_path().to_string()),
                Err(reason) => {
                    engine_warn!("Skipping image {} ({}): {}", image.name(), image.source(), reason);
                    sink.emit(PipelineEvent::ItemSkipped {
                        stage: Stage::MaterializingImages,
                        item: image.rel_path().to_string(),
                        reason,
                    });
                }
            }
            sink.emit(PipelineEvent::Progress(Progress {
                stage: Stage::MaterializingImages,
                done: done + 1,
                total,
            }));
        }
        written
    }

    /// Renders one page per article with content. Returns the ids rendered.
    pub fn render_articles(
        &self,
        issue: &Issue,
        layout: &PackageLayout,
        sink: &dyn ProgressSink,
    ) -> Vec<String> {
        let writer = AtomicFileWriter::new(layout.oebps.clone());
        let total = issue.rendered_articles().count();
        let mut rendered = Vec::new();
        for article in issue.articles() {
            let Some(page) = render_article(article) else {
                continue;
            };
            match writer.write(&article.file_name(), page) {
                Ok(_) => rendered.push(article.id().to_string()),
                Err(err) => {
                    engine_warn!("Cannot write article {}: {}", article.id(), err);
                    sink.emit(PipelineEvent::ItemSkipped {
                        stage: Stage::RenderingArticles,
                        item: article.id().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
            sink.emit(PipelineEvent::Progress(Progress {
                stage: Stage::RenderingArticles,
                done: rendered.len(),
                total,
            }));
        }
        rendered
    }

    pub fn render_metadata(
        &self,
        issue: &Issue,
        layout: &PackageLayout,
        rendered: &[String],
        images: &[String],
    ) -> Result<(), PackageError> {
        let contents = PackageContents::new(issue, rendered, images, &self.config.language);
        let workdir = AtomicFileWriter::new(layout.workdir.clone());
        let documents = [
            ("META-INF/container.xml", render_container_xml()),
            ("OEBPS/content.opf", render_content_opf(&contents)),
            ("OEBPS/toc.html", render_toc_html(&contents)),
            ("OEBPS/toc.ncx", render_toc_ncx(&contents)),
            ("OEBPS/style.css", STYLE_CSS.to_string()),
        ];
        for (file, body) in documents {
            workdir
                .write(file, body)
                .map_err(|source| PackageError::Render {
                    file: file.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Replaces `<issues>/<issue id>.epub` with the current working tree.
    pub fn archive(&self, issue: &Issue, layout: &PackageLayout) -> Result<PathBuf, PackageError> {
        let target = self.archive_path(issue);
        engine_info!("Creating {}", target.display());
        Ok(archive_dir(&layout.workdir, &target)?)
    }

    /// Runs the converter; the archive stands in when it is missing or fails.
    pub fn convert(&self, archive: &Path) -> PathBuf {
        let Some(converter) = &self.converter else {
            return archive.to_path_buf();
        };
        match converter.convert(archive) {
            Ok(converted) => converted,
            Err(ConversionError::Unavailable(binary)) => {
                engine_info!("Converter {} not found, keeping {}", binary.display(), archive.display());
                archive.to_path_buf()
            }
            Err(err) => {
                engine_warn!("Conversion of {} failed: {}", archive.display(), err);
                archive.to_path_buf()
            }
        }
    }

    /// Full packaging run. Returns the converted file when there is one,
    /// else the archive.
    pub async fn write(
        &self,
        issue: &Issue,
        session: &dyn Session,
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf, PackageError> {
        let layout = self.prepare_layout(issue)?;
        let images = self.materialize_images(issue, &layout, session, sink).await;
        let rendered = self.render_articles(issue, &layout, sink);

        stage(sink, Stage::RenderingMetadata);
        self.render_metadata(issue, &layout, &rendered, &images)?;
        stage(sink, Stage::Archiving);
        let archive = self.archive(issue, &layout)?;
        stage(sink, Stage::Converting);
        Ok(self.convert(&archive))
    }
}

fn stage(sink: &dyn ProgressSink, stage: Stage) {
    sink.emit(PipelineEvent::Progress(Progress {
        stage,
        done: 0,
        total: 1,
    }));
}
