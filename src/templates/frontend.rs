use super::render::{env_example, html_escape, link_vars, quoted};
use super::{RenderContext, RenderedFile, ServiceCategory, ServiceTemplate};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendKind {
    React,
    Vue,
    Angular,
}

/// Single-page app served as static files from a small Node image.
#[derive(Debug, Clone, Copy)]
pub struct FrontendTemplate {
    kind: FrontendKind,
}

impl FrontendTemplate {
    pub fn new(kind: FrontendKind) -> Self {
        Self { kind }
    }

    fn build_dir(&self) -> &'static str {
        match self.kind {
            FrontendKind::React => "build",
            FrontendKind::Vue => "dist",
            FrontendKind::Angular => "dist/app/browser",
        }
    }

    fn package_json(&self, ctx: &RenderContext<'_>) -> String {
        let (scripts, deps, dev_deps) = match self.kind {
            FrontendKind::React => (
                r#""start": "react-scripts start",
    "build": "react-scripts build""#,
                r#""react": "^18.3.1",
    "react-dom": "^18.3.1",
    "react-scripts": "5.0.1""#,
                "",
            ),
            FrontendKind::Vue => (
                r#""dev": "vite",
    "build": "vite build""#,
                r#""vue": "^3.4.0""#,
                r#""@vitejs/plugin-vue": "^5.0.0",
    "vite": "^5.2.0""#,
            ),
            FrontendKind::Angular => (
                r#""start": "ng serve",
    "build": "ng build""#,
                r#""@angular/common": "^17.3.0",
    "@angular/compiler": "^17.3.0",
    "@angular/core": "^17.3.0",
    "@angular/platform-browser": "^17.3.0",
    "rxjs": "^7.8.0",
    "zone.js": "^0.14.0""#,
                r#""@angular/cli": "^17.3.0",
    "@angular/compiler-cli": "^17.3.0",
    "@angular-devkit/build-angular": "^17.3.0",
    "typescript": "~5.4.0""#,
            ),
        };

        let mut out = format!(
            "{{\n  \"name\": {},\n  \"version\": \"0.1.0\",\n  \"private\": true,\n  \"scripts\": {{\n    {}\n  }},\n  \"dependencies\": {{\n    {}\n  }}",
            quoted(ctx.service_name),
            scripts,
            deps
        );
        if !dev_deps.is_empty() {
            out.push_str(&format!(",\n  \"devDependencies\": {{\n    {}\n  }}", dev_deps));
        }
        out.push_str("\n}\n");
        out
    }

    fn index_html(&self, ctx: &RenderContext<'_>) -> String {
        let (root, script) = match self.kind {
            FrontendKind::React => ("<div id=\"root\"></div>", String::new()),
            FrontendKind::Vue => (
                "<div id=\"app\"></div>",
                "\n    <script type=\"module\" src=\"/src/main.js\"></script>".to_string(),
            ),
            FrontendKind::Angular => ("<app-root></app-root>", String::new()),
        };
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n  <head>\n    <meta charset=\"utf-8\" />\n    <title>{}</title>\n  </head>\n  <body>\n    {}{}\n  </body>\n</html>\n",
            html_escape(ctx.title()),
            root,
            script
        )
    }

    /// Names of the backends this app talks to, listed on the landing page.
    fn backends_literal(ctx: &RenderContext<'_>) -> String {
        let names: Vec<String> = ctx.links.iter().map(|l| quoted(&l.service_name)).collect();
        format!("[{}]", names.join(", "))
    }
}

impl ServiceTemplate for FrontendTemplate {
    fn service_type(&self) -> &str {
        match self.kind {
            FrontendKind::React => "react",
            FrontendKind::Vue => "vue",
            FrontendKind::Angular => "angular",
        }
    }

    fn display_name(&self) -> &str {
        match self.kind {
            FrontendKind::React => "React",
            FrontendKind::Vue => "Vue.js",
            FrontendKind::Angular => "Angular",
        }
    }

    fn category(&self) -> ServiceCategory {
        ServiceCategory::Frontend
    }

    fn default_port(&self) -> u16 {
        match self.kind {
            FrontendKind::React => 3000,
            FrontendKind::Vue => 8080,
            FrontendKind::Angular => 4200,
        }
    }

    fn default_environment(&self, _service_name: &str, port: u16) -> Vec<(String, String)> {
        vec![("PORT".to_string(), port.to_string())]
    }

    fn render_source_files(&self, ctx: &RenderContext<'_>) -> Vec<RenderedFile> {
        let title = quoted(ctx.title());
        let backends = Self::backends_literal(ctx);
        let mut files = vec![RenderedFile::new("package.json", self.package_json(ctx))];

        match self.kind {
            FrontendKind::React => {
                files.push(RenderedFile::new("public/index.html", self.index_html(ctx)));
                files.push(RenderedFile::new(
                    "src/index.js",
                    "import React from 'react';\nimport { createRoot } from 'react-dom/client';\nimport App from './App';\n\ncreateRoot(document.getElementById('root')).render(<App />);\n",
                ));
                files.push(RenderedFile::new(
                    "src/App.js",
                    format!(
                        "const BACKENDS = {backends};\n\nexport default function App() {{\n  return (\n    <main>\n      <h1>{{{title}}}</h1>\n      <ul>\n        {{BACKENDS.map((name) => <li key={{name}}>{{name}}</li>)}}\n      </ul>\n    </main>\n  );\n}}\n"
                    ),
                ));
            }
            FrontendKind::Vue => {
                files.push(RenderedFile::new("index.html", self.index_html(ctx)));
                files.push(RenderedFile::new(
                    "vite.config.js",
                    "import { defineConfig } from 'vite';\nimport vue from '@vitejs/plugin-vue';\n\nexport default defineConfig({ plugins: [vue()] });\n",
                ));
                files.push(RenderedFile::new(
                    "src/main.js",
                    "import { createApp } from 'vue';\nimport App from './App.vue';\n\ncreateApp(App).mount('#app');\n",
                ));
                files.push(RenderedFile::new(
                    "src/App.vue",
                    format!(
                        "<script setup>\nconst title = {title};\nconst backends = {backends};\n</script>\n\n<template>\n  <main>\n    <h1>{{{{ title }}}}</h1>\n    <ul>\n      <li v-for=\"name in backends\" :key=\"name\">{{{{ name }}}}</li>\n    </ul>\n  </main>\n</template>\n"
                    ),
                ));
            }
            FrontendKind::Angular => {
                files.push(RenderedFile::new(
                    "angular.json",
                    format!(
                        "{{\n  \"version\": 1,\n  \"projects\": {{\n    \"app\": {{\n      \"projectType\": \"application\",\n      \"root\": \"\",\n      \"sourceRoot\": \"src\",\n      \"architect\": {{\n        \"build\": {{\n          \"builder\": \"@angular-devkit/build-angular:application\",\n          \"options\": {{\n            \"outputPath\": \"dist/app\",\n            \"index\": \"src/index.html\",\n            \"browser\": \"src/main.ts\",\n            \"tsConfig\": \"tsconfig.json\"\n          }}\n        }}\n      }}\n    }}\n  }}\n}}\n"
                    ),
                ));
                files.push(RenderedFile::new(
                    "tsconfig.json",
                    "{\n  \"compilerOptions\": {\n    \"target\": \"ES2022\",\n    \"module\": \"ES2022\",\n    \"moduleResolution\": \"node\",\n    \"experimentalDecorators\": true,\n    \"strict\": true\n  },\n  \"files\": [\"src/main.ts\"]\n}\n",
                ));
                files.push(RenderedFile::new("src/index.html", self.index_html(ctx)));
                files.push(RenderedFile::new(
                    "src/main.ts",
                    "import { bootstrapApplication } from '@angular/platform-browser';\nimport { AppComponent } from './app/app.component';\n\nbootstrapApplication(AppComponent).catch((err) => console.error(err));\n",
                ));
                files.push(RenderedFile::new(
                    "src/app/app.component.ts",
                    format!(
                        "import {{ Component }} from '@angular/core';\nimport {{ NgFor }} from '@angular/common';\n\n@Component({{\n  selector: 'app-root',\n  standalone: true,\n  imports: [NgFor],\n  template: `<h1>{{{{ title }}}}</h1><ul><li *ngFor=\"let name of backends\">{{{{ name }}}}</li></ul>`,\n}})\nexport class AppComponent {{\n  title = {title};\n  backends = {backends};\n}}\n"
                    ),
                ));
            }
        }

        files.push(RenderedFile::new(".env.example", env_example(ctx)));
        files
    }

    fn render_dockerfile(&self, ctx: &RenderContext<'_>) -> String {
        let mut out = format!(
            "FROM node:20-alpine AS build\nWORKDIR /app\nCOPY package*.json ./\nRUN npm install\nCOPY . .\nRUN npm run build\n\nFROM node:20-alpine\nWORKDIR /app\nRUN npm install -g serve\nCOPY --from=build /app/{} ./public\nENV PORT={}\n",
            self.build_dir(),
            ctx.port
        );
        let vars = link_vars(ctx.links);
        if !vars.is_empty() {
            out.push_str(&format!("# Backend addresses are provided at runtime: {}\n", vars.join(", ")));
        }
        out.push_str(&format!(
            "EXPOSE {}\nCMD [\"sh\", \"-c\", \"serve -s public -l $PORT\"]\n",
            ctx.port
        ));
        out
    }
}

pub fn templates() -> Vec<Arc<dyn ServiceTemplate>> {
    vec![
        Arc::new(FrontendTemplate::new(FrontendKind::React)),
        Arc::new(FrontendTemplate::new(FrontendKind::Vue)),
        Arc::new(FrontendTemplate::new(FrontendKind::Angular)),
    ]
}
