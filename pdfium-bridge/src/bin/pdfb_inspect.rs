//! CLI tool to inspect a PDF through the bridge
//!
//! Prints the page count, the size and links of one page, and optionally
//! renders that page to PNG.
//!
//! # Usage
//!
//! ```bash
//! pdfb-inspect document.pdf --page 0 --render page0.png --scale 2.0
//! PDFIUM_LIB_DIR=/opt/pdfium/lib pdfb-inspect secret.pdf --password hunter2
//! ```

use clap::Parser;
use pdfium_bridge::{Library, LinkTarget, OwnedBitmap};
use std::path::PathBuf;

/// Inspect a PDF document
#[derive(Parser, Debug)]
#[command(name = "pdfb-inspect")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input PDF file
    pdf: PathBuf,

    /// Password for encrypted documents
    #[arg(long)]
    password: Option<String>,

    /// Page to inspect (0-indexed)
    #[arg(short, long, default_value = "0")]
    page: i32,

    /// Render the page to this PNG file
    #[arg(short, long)]
    render: Option<PathBuf>,

    /// Render width in pixels (default: page width * scale)
    #[arg(long)]
    width: Option<u32>,

    /// Render height in pixels (default: page height * scale)
    #[arg(long)]
    height: Option<u32>,

    /// Scale applied to the page size when width/height are not given
    #[arg(long, default_value = "1.0")]
    scale: f32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    }

    let path = args.pdf.to_string_lossy();
    let library = Library::global()?;
    let mut doc = library.open_document(&path, args.password.as_deref())?;

    let page_count = doc.page_count()?;
    println!("File:  {}", args.pdf.display());
    println!("Pages: {page_count}");

    if args.page < 0 || args.page >= page_count {
        eprintln!(
            "Error: page {} out of range (document has {page_count} pages)",
            args.page
        );
        doc.close();
        std::process::exit(1);
    }

    let size = doc.page_size(args.page)?;
    println!(
        "Page {}: {:.2} x {:.2} pt",
        args.page, size.width, size.height
    );

    let links = doc.links_for_page(args.page)?;
    println!("Links: {}", links.len());
    for (i, link) in links.iter().enumerate() {
        let target = match &link.target {
            LinkTarget::Uri(uri) => uri.clone(),
            LinkTarget::Page(page) => format!("page {page}"),
            LinkTarget::Unresolved => "(unresolved)".to_string(),
        };
        println!(
            "  [{i}] ({:.1}, {:.1}, {:.1}, {:.1}) -> {target}",
            link.rect.left, link.rect.top, link.rect.right, link.rect.bottom
        );
    }

    if let Some(output) = &args.render {
        let width = args
            .width
            .unwrap_or_else(|| (size.width * args.scale).round().max(1.0) as u32);
        let height = args
            .height
            .unwrap_or_else(|| (size.height * args.scale).round().max(1.0) as u32);

        let mut bitmap = OwnedBitmap::new(width, height);
        doc.render_page_to_bitmap(args.page, &mut bitmap, args.scale)?;
        bitmap.save_as_png(output)?;
        println!("Rendered {width}x{height} -> {}", output.display());
    }

    doc.close();
    Ok(())
}
