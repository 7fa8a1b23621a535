use std::path::Path;

use crate::assets::BrandAssets;
use crate::batch::RenderInputs;
use crate::photos::PhotoIndex;
use crate::render::raster::FontBook;
use crate::roster::Roster;
use crate::schedule::Schedule;
use crate::settings::FormState;

const FONTS_DIR: &str = "fonts";

/// Everything the user has loaded since the workspace was selected. Dropped with the workspace.
#[derive(Default)]
pub struct Session {
    pub roster: Option<Roster>,
    pub photos: PhotoIndex,
    pub schedule: Schedule,
    pub form: FormState,
    fonts: Option<FontBook>,
}

impl Session {
    pub fn new(form: FormState) -> Self {
        Session {
            form,
            ..Session::default()
        }
    }

    /// Loaded on first use; later calls share the same database.
    pub fn fonts(&mut self, workspace: &Path) -> FontBook {
        self.fonts
            .get_or_insert_with(|| {
                let dir = workspace.join(FONTS_DIR);
                FontBook::load(&[dir.as_path()])
            })
            .clone()
    }

    /// Logo and signature from the form's paths, decoded now so the pass itself never touches
    /// the filesystem.
    pub fn brand_assets(&self) -> BrandAssets {
        let path = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| Path::new(s).to_path_buf())
        };
        let logo = path(&self.form.paths.logo);
        let signature = path(&self.form.paths.signature);
        BrandAssets::resolve(logo.as_deref(), signature.as_deref())
    }

    pub fn render_inputs<'a>(
        &'a self,
        roster: &'a Roster,
        brand: &'a BrandAssets,
        fonts: &'a FontBook,
    ) -> RenderInputs<'a> {
        RenderInputs {
            roster,
            template: self.form.template,
            school: &self.form.school,
            brand,
            photos: &self.photos,
            schedule: self.schedule.entries(),
            fonts,
        }
    }
}
