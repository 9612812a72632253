use super::render::{env_example, quoted};
use super::{RenderContext, RenderedFile, ServiceCategory, ServiceTemplate};
use std::sync::Arc;

/// Express service with a health route and a route listing its dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PythonFramework {
    Flask,
    FastApi,
}

#[derive(Debug, Clone, Copy)]
pub struct PythonApiTemplate {
    framework: PythonFramework,
}

impl PythonApiTemplate {
    pub fn new(framework: PythonFramework) -> Self {
        Self { framework }
    }
}

fn js_dependencies(ctx: &RenderContext<'_>) -> String {
    if ctx.links.is_empty() {
        return "const dependencies = {};\n".to_string();
    }
    let mut out = String::from("const dependencies = {\n");
    for link in ctx.links {
        out.push_str(&format!(
            "  {}: {{ host: process.env.{}, port: process.env.{}{} }},\n",
            quoted(&link.service_name),
            link.host_var(),
            link.port_var(),
            if link.has_url {
                format!(", url: process.env.{}", link.url_var())
            } else {
                String::new()
            }
        ));
    }
    out.push_str("};\n");
    out
}

fn py_dependencies(ctx: &RenderContext<'_>) -> String {
    if ctx.links.is_empty() {
        return "DEPENDENCIES = {}\n".to_string();
    }
    let mut out = String::from("DEPENDENCIES = {\n");
    for link in ctx.links {
        out.push_str(&format!(
            "    {}: {{\"host\": os.environ.get(\"{}\"), \"port\": os.environ.get(\"{}\"){}}},\n",
            quoted(&link.service_name),
            link.host_var(),
            link.port_var(),
            if link.has_url {
                format!(", \"url\": os.environ.get(\"{}\")", link.url_var())
            } else {
                String::new()
            }
        ));
    }
    out.push_str("}\n");
    out
}

impl ServiceTemplate for NodeTemplate {
    fn service_type(&self) -> &str {
        "node"
    }

    fn display_name(&self) -> &str {
        "Node.js"
    }

    fn category(&self) -> ServiceCategory {
        ServiceCategory::Backend
    }

    fn default_port(&self) -> u16 {
        5000
    }

    fn default_environment(&self, _service_name: &str, port: u16) -> Vec<(String, String)> {
        vec![
            ("NODE_ENV".to_string(), "production".to_string()),
            ("PORT".to_string(), port.to_string()),
        ]
    }

    fn render_source_files(&self, ctx: &RenderContext<'_>) -> Vec<RenderedFile> {
        let package = format!(
            "{{\n  \"name\": {},\n  \"version\": \"0.1.0\",\n  \"private\": true,\n  \"main\": \"src/index.js\",\n  \"scripts\": {{\n    \"start\": \"node src/index.js\"\n  }},\n  \"dependencies\": {{\n    \"express\": \"^4.19.2\"\n  }}\n}}\n",
            quoted(ctx.service_name)
        );
        let index = format!(
            "const express = require('express');\n\nconst app = express();\nconst PORT = process.env.PORT || {port};\n\n{deps}\napp.use(express.json());\n\napp.get('/health', (req, res) => {{\n  res.json({{ status: 'ok', service: {name} }});\n}});\n\napp.get('/dependencies', (req, res) => {{\n  res.json(dependencies);\n}});\n\napp.listen(PORT, () => {{\n  console.log({title} + ' listening on port ' + PORT);\n}});\n",
            port = ctx.port,
            deps = js_dependencies(ctx),
            name = quoted(ctx.service_name),
            title = quoted(ctx.title()),
        );
        vec![
            RenderedFile::new("package.json", package),
            RenderedFile::new("src/index.js", index),
            RenderedFile::new(".dockerignore", "node_modules\nnpm-debug.log\n"),
            RenderedFile::new(".env.example", env_example(ctx)),
        ]
    }

    fn render_dockerfile(&self, ctx: &RenderContext<'_>) -> String {
        format!(
            "FROM node:20-alpine\nWORKDIR /app\nCOPY package*.json ./\nRUN npm install --omit=dev\nCOPY . .\nENV PORT={}\nEXPOSE {}\nCMD [\"npm\", \"start\"]\n",
            ctx.port, ctx.port
        )
    }
}

impl ServiceTemplate for PythonApiTemplate {
    fn service_type(&self) -> &str {
        match self.framework {
            PythonFramework::Flask => "python-flask",
            PythonFramework::FastApi => "python-fastapi",
        }
    }

    fn display_name(&self) -> &str {
        match self.framework {
            PythonFramework::Flask => "Flask",
            PythonFramework::FastApi => "FastAPI",
        }
    }

    fn category(&self) -> ServiceCategory {
        ServiceCategory::Backend
    }

    fn default_port(&self) -> u16 {
        match self.framework {
            PythonFramework::Flask => 5000,
            PythonFramework::FastApi => 8000,
        }
    }

    fn default_environment(&self, _service_name: &str, port: u16) -> Vec<(String, String)> {
        vec![
            ("PORT".to_string(), port.to_string()),
            ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
        ]
    }

    fn render_source_files(&self, ctx: &RenderContext<'_>) -> Vec<RenderedFile> {
        let deps = py_dependencies(ctx);
        let name = quoted(ctx.service_name);
        let (requirements, entry, source) = match self.framework {
            PythonFramework::Flask => (
                "flask==3.0.3\ngunicorn==22.0.0\n",
                "app.py",
                format!(
                    "import os\n\nfrom flask import Flask, jsonify\n\napp = Flask(__name__)\n\n{deps}\n\n@app.get(\"/health\")\ndef health():\n    return jsonify(status=\"ok\", service={name})\n\n\n@app.get(\"/dependencies\")\ndef dependencies():\n    return jsonify(DEPENDENCIES)\n\n\nif __name__ == \"__main__\":\n    app.run(host=\"0.0.0.0\", port=int(os.environ.get(\"PORT\", {port})))\n",
                    port = ctx.port
                ),
            ),
            PythonFramework::FastApi => (
                "fastapi==0.111.0\nuvicorn[standard]==0.30.1\n",
                "main.py",
                format!(
                    "import os\n\nfrom fastapi import FastAPI\n\napp = FastAPI(title={name})\n\n{deps}\n\n@app.get(\"/health\")\ndef health():\n    return {{\"status\": \"ok\", \"service\": {name}}}\n\n\n@app.get(\"/dependencies\")\ndef dependencies():\n    return DEPENDENCIES\n\n\nif __name__ == \"__main__\":\n    import uvicorn\n\n    uvicorn.run(app, host=\"0.0.0.0\", port=int(os.environ.get(\"PORT\", {port})))\n",
                    port = ctx.port
                ),
            ),
        };
        vec![
            RenderedFile::new("requirements.txt", requirements),
            RenderedFile::new(entry, source),
            RenderedFile::new(".env.example", env_example(ctx)),
        ]
    }

    fn render_dockerfile(&self, ctx: &RenderContext<'_>) -> String {
        let cmd = match self.framework {
            PythonFramework::Flask => "gunicorn --bind 0.0.0.0:$PORT app:app",
            PythonFramework::FastApi => "uvicorn main:app --host 0.0.0.0 --port $PORT",
        };
        format!(
            "FROM python:3.12-slim\nWORKDIR /app\nCOPY requirements.txt .\nRUN pip install --no-cache-dir -r requirements.txt\nCOPY . .\nENV PORT={}\nEXPOSE {}\nCMD [\"sh\", \"-c\", \"{}\"]\n",
            ctx.port, ctx.port, cmd
        )
    }
}

pub fn templates() -> Vec<Arc<dyn ServiceTemplate>> {
    vec![
        Arc::new(NodeTemplate),
        Arc::new(PythonApiTemplate::new(PythonFramework::Flask)),
        Arc::new(PythonApiTemplate::new(PythonFramework::FastApi)),
    ]
}
