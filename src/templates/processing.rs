use super::render::{env_example, link_vars};
use super::{RenderContext, RenderedFile, ServiceCategory, ServiceTemplate};
use std::sync::Arc;

/// PySpark batch job running in local mode, with the Spark UI on the
/// service port.
#[derive(Debug, Clone, Copy, Default)]
pub struct PySparkTemplate;

impl ServiceTemplate for PySparkTemplate {
    fn service_type(&self) -> &str {
        "pyspark"
    }

    fn display_name(&self) -> &str {
        "PySpark"
    }

    fn category(&self) -> ServiceCategory {
        ServiceCategory::Processing
    }

    fn default_port(&self) -> u16 {
        8080
    }

    fn default_environment(&self, _service_name: &str, port: u16) -> Vec<(String, String)> {
        vec![
            ("SPARK_MASTER".to_string(), "local[*]".to_string()),
            ("SPARK_UI_PORT".to_string(), port.to_string()),
        ]
    }

    fn render_source_files(&self, ctx: &RenderContext<'_>) -> Vec<RenderedFile> {
        let mut inputs = String::new();
        for var in link_vars(ctx.links) {
            inputs.push_str(&format!("    print(\"{var} =\", os.environ.get(\"{var}\"))\n"));
        }
        if inputs.is_empty() {
            inputs.push_str("    pass\n");
        }

        let job = format!(
            "import os\n\nfrom pyspark.sql import SparkSession\n\n\ndef log_inputs():\n{inputs}\n\ndef main():\n    log_inputs()\n    spark = (\n        SparkSession.builder.appName({app})\n        .master(os.environ.get(\"SPARK_MASTER\", \"local[*]\"))\n        .config(\"spark.ui.port\", os.environ.get(\"SPARK_UI_PORT\", \"{port}\"))\n        .getOrCreate()\n    )\n    df = spark.range(0, 100)\n    print(\"rows:\", df.count())\n    spark.stop()\n\n\nif __name__ == \"__main__\":\n    main()\n",
            app = super::render::quoted(ctx.service_name),
            port = ctx.port
        );

        vec![
            RenderedFile::new("requirements.txt", "pyspark==3.5.1\n"),
            RenderedFile::new("job.py", job),
            RenderedFile::new(
                "run.sh",
                "#!/bin/sh\nset -e\nexec spark-submit job.py\n",
            )
            .executable(),
            RenderedFile::new(".env.example", env_example(ctx)),
        ]
    }

    fn render_dockerfile(&self, ctx: &RenderContext<'_>) -> String {
        format!(
            "FROM python:3.11-slim\nRUN apt-get update && apt-get install -y --no-install-recommends openjdk-17-jre-headless && rm -rf /var/lib/apt/lists/*\nWORKDIR /app\nCOPY requirements.txt .\nRUN pip install --no-cache-dir -r requirements.txt\nCOPY . .\nEXPOSE {}\nCMD [\"./run.sh\"]\n",
            ctx.port
        )
    }
}

pub fn templates() -> Vec<Arc<dyn ServiceTemplate>> {
    vec![Arc::new(PySparkTemplate)]
}
